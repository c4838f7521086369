//! Shared helpers for the end-to-end tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::Service;
use tower_lsp::jsonrpc::{Request, Response};
use tower_lsp::lsp_types::*;
use tower_lsp::{ClientSocket, LspService};

use stylesheet_lsp::config::{CacheLimits, ServerConfig};
use stylesheet_lsp::document::TextDocument;
use stylesheet_lsp::lsp::backend::Backend;
use stylesheet_lsp::service::{LanguageService, LanguageServices, LanguageSettings, ServiceError};

/// What the fake engines observed, shared across every registered language
#[derive(Default)]
pub struct FakeStats {
    parses: AtomicUsize,
    validations: Mutex<Vec<String>>,
    configured: Mutex<Vec<(String, Option<LanguageSettings>)>>,
}

impl FakeStats {
    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    /// Text of every validated stylesheet, in order
    pub fn validations(&self) -> Vec<String> {
        self.validations.lock().unwrap().clone()
    }

    pub fn configured(&self) -> Vec<(String, Option<LanguageSettings>)> {
        self.configured.lock().unwrap().clone()
    }
}

/// Engine whose stylesheet is the document text at parse time.
///
/// Completion always fails and references always panic, so the dispatch
/// boundary can be observed from the outside.
pub struct FakeService {
    language_id: String,
    stats: Arc<FakeStats>,
    snapshot: Mutex<Option<LanguageSettings>>,
}

impl LanguageService for FakeService {
    type Stylesheet = String;

    fn parse_stylesheet(&self, document: &TextDocument) -> Result<String, ServiceError> {
        self.stats.parses.fetch_add(1, Ordering::SeqCst);
        Ok(document.text().to_string())
    }

    fn do_validation(
        &self,
        document: &TextDocument,
        stylesheet: &String,
        settings: Option<&LanguageSettings>,
    ) -> Result<Vec<Diagnostic>, ServiceError> {
        self.stats
            .validations
            .lock()
            .unwrap()
            .push(stylesheet.clone());
        let snapshot = self.snapshot.lock().unwrap().clone();
        if settings.or(snapshot.as_ref()).is_some_and(|settings| !settings.validate) {
            return Ok(Vec::new());
        }
        Ok(vec![Diagnostic::new_simple(
            document.range_of(0, 0),
            format!("{}: {}", self.language_id, stylesheet),
        )])
    }

    fn configure(&self, settings: Option<LanguageSettings>) {
        *self.snapshot.lock().unwrap() = settings.clone();
        self.stats
            .configured
            .lock()
            .unwrap()
            .push((self.language_id.clone(), settings));
    }

    fn do_complete(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &String,
    ) -> Result<CompletionList, ServiceError> {
        Err(ServiceError::Query {
            operation: "completion",
            reason: "engine failure".to_string(),
        })
    }

    fn do_hover(
        &self,
        _document: &TextDocument,
        _position: Position,
        stylesheet: &String,
    ) -> Result<Option<Hover>, ServiceError> {
        Ok(Some(Hover {
            contents: HoverContents::Scalar(MarkedString::String(format!(
                "{}: {}",
                self.language_id, stylesheet
            ))),
            range: None,
        }))
    }

    fn find_references(
        &self,
        _document: &TextDocument,
        _position: Position,
        _stylesheet: &String,
    ) -> Result<Vec<Location>, ServiceError> {
        panic!("references exploded")
    }
}

/// Registry of fake engines for `css` (default) and `scss`
pub fn create_fake_services() -> (LanguageServices<FakeService>, Arc<FakeStats>) {
    let stats = Arc::new(FakeStats::default());
    let service = |language_id: &str| FakeService {
        language_id: language_id.to_string(),
        stats: Arc::clone(&stats),
        snapshot: Mutex::new(None),
    };
    let services = LanguageServices::new(service("css")).with("scss", service("scss"));
    (services, stats)
}

pub fn test_config(validation_delay_ms: u64) -> ServerConfig {
    ServerConfig {
        validation_delay: Duration::from_millis(validation_delay_ms),
        cache_limits: CacheLimits::unbounded(),
    }
}

/// LspService over fake engines plus the socket collector
pub fn create_fake_service(
    validation_delay_ms: u64,
) -> (
    LspService<Backend<FakeService>>,
    mpsc::UnboundedReceiver<Request>,
    Arc<FakeStats>,
) {
    let (services, stats) = create_fake_services();
    let (service, socket) = LspService::build(move |client| {
        Backend::build(client, services, test_config(validation_delay_ms))
    })
    .finish();
    let notifications = spawn_notification_collector(socket);
    (service, notifications, stats)
}

pub fn create_initialize_request(id: i64) -> Request {
    create_initialize_request_with(id, json!({ "capabilities": {} }))
}

pub fn create_initialize_request_with(id: i64, params: Value) -> Request {
    Request::build("initialize").params(params).id(id).finish()
}

pub fn create_initialized_notification() -> Request {
    Request::build("initialized").params(json!({})).finish()
}

pub fn create_shutdown_request(id: i64) -> Request {
    Request::build("shutdown").id(id).finish()
}

pub fn create_did_open_notification(uri: &str, language_id: &str, text: &str) -> Request {
    Request::build("textDocument/didOpen")
        .params(json!({
            "textDocument": {
                "uri": uri,
                "languageId": language_id,
                "version": 1,
                "text": text
            }
        }))
        .finish()
}

pub fn create_did_change_notification(uri: &str, version: i32, text: &str) -> Request {
    Request::build("textDocument/didChange")
        .params(json!({
            "textDocument": { "uri": uri, "version": version },
            "contentChanges": [{ "text": text }]
        }))
        .finish()
}

pub fn create_did_close_notification(uri: &str) -> Request {
    Request::build("textDocument/didClose")
        .params(json!({ "textDocument": { "uri": uri } }))
        .finish()
}

pub fn create_did_change_configuration_notification(settings: Value) -> Request {
    Request::build("workspace/didChangeConfiguration")
        .params(json!({ "settings": settings }))
        .finish()
}

/// Request whose params are a text document position (hover, completion, ...)
pub fn create_position_request(id: i64, method: &'static str, uri: &str, line: u32, character: u32) -> Request {
    let mut params = json!({
        "textDocument": { "uri": uri },
        "position": { "line": line, "character": character }
    });
    if method == "textDocument/references" {
        params["context"] = json!({ "includeDeclaration": true });
    }
    Request::build(method).params(params).id(id).finish()
}

/// Request whose params are only a text document (symbols, colors, ...)
pub fn create_document_request(id: i64, method: &'static str, uri: &str) -> Request {
    Request::build(method)
        .params(json!({ "textDocument": { "uri": uri } }))
        .id(id)
        .finish()
}

/// Calls `initialize` then `initialized`
pub async fn initialize<S>(service: &mut S, params: Value)
where
    S: Service<Request, Response = Option<Response>>,
    S::Error: std::fmt::Debug,
{
    service
        .call(create_initialize_request_with(1, params))
        .await
        .unwrap();
    service
        .call(create_initialized_notification())
        .await
        .unwrap();
}

/// Sends a request and returns its result value
pub async fn request<S>(service: &mut S, request: Request) -> Value
where
    S: Service<Request, Response = Option<Response>>,
    S::Error: std::fmt::Debug,
{
    let response = service
        .call(request)
        .await
        .unwrap()
        .expect("Expected a response");
    response
        .result()
        .cloned()
        .unwrap_or_else(|| panic!("Expected a result, got {:?}", response))
}

/// Drains server-to-client traffic. Notifications are forwarded to the
/// returned channel; server requests (e.g. `workspace/configuration`) are
/// answered with `[null]`.
pub fn spawn_notification_collector(socket: ClientSocket) -> mpsc::UnboundedReceiver<Request> {
    let (tx, rx) = mpsc::unbounded_channel();
    let (mut requests, mut responses) = socket.split();

    tokio::spawn(async move {
        while let Some(message) = requests.next().await {
            match message.id().cloned() {
                Some(id) => {
                    let reply = Response::from_ok(id, json!([null]));
                    if responses.send(reply).await.is_err() {
                        break;
                    }
                }
                None => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
            }
        }
    });

    rx
}

/// Waits for the next notification named `method`, skipping others
pub async fn wait_for_notification(
    rx: &mut mpsc::UnboundedReceiver<Request>,
    method: &str,
) -> Option<Request> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(notification) = rx.recv().await {
            if notification.method() == method {
                return Some(notification);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

pub async fn wait_for_diagnostics(
    rx: &mut mpsc::UnboundedReceiver<Request>,
) -> Option<PublishDiagnosticsParams> {
    let notification = wait_for_notification(rx, "textDocument/publishDiagnostics").await?;
    serde_json::from_value(notification.params()?.clone()).ok()
}

/// Returns every notification named `method` that is already queued
pub fn drain_notifications(rx: &mut mpsc::UnboundedReceiver<Request>, method: &str) -> Vec<Request> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|notification| notification.method() == method)
        .collect()
}

pub fn hover_text(value: Value) -> String {
    let hover: Hover = serde_json::from_value(value).unwrap();
    match hover.contents {
        HoverContents::Scalar(MarkedString::String(text)) => text,
        other => panic!("unexpected hover contents {:?}", other),
    }
}
