use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::document::TextDocument;
use crate::lsp::client_state::{ClientState, InitializationOptions};
use crate::lsp::diagnostics::ValidationScheduler;
use crate::lsp::router::RequestRouter;
use crate::service::custom_data::load_custom_data;
use crate::service::fs::LocalFileSystem;
use crate::service::stylesheet::language_services;
use crate::service::{LanguageService, LanguageServices, StylesheetService};

pub struct Backend<S: LanguageService = StylesheetService> {
    client: Client,
    router: RequestRouter<S>,
    validation: ValidationScheduler,
    shutdown: CancellationToken,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::with_config(client, ServerConfig::default())
    }

    pub fn with_config(client: Client, config: ServerConfig) -> Self {
        let services = language_services(Arc::new(LocalFileSystem));
        Self::build(client, services, config)
    }
}

impl<S: LanguageService> Backend<S> {
    /// Build a Backend around the given engines (for testing)
    pub fn build(client: Client, services: LanguageServices<S>, config: ServerConfig) -> Self {
        let router = RequestRouter::new(
            services,
            config.cache_limits,
            Arc::new(client.clone()),
        );
        router.stylesheets().start_cleanup();
        let validation = ValidationScheduler::new(config.validation_delay, Arc::new(client.clone()));

        Self {
            client,
            router,
            validation,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn router(&self) -> &RequestRouter<S> {
        &self.router
    }

    pub fn server_capabilities(snippet_support: bool) -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    ..Default::default()
                },
            )),
            completion_provider: snippet_support.then(|| CompletionOptions {
                resolve_provider: Some(false),
                trigger_characters: Some(vec!["/".to_string(), "-".to_string()]),
                ..Default::default()
            }),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            document_symbol_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            definition_provider: Some(OneOf::Left(true)),
            document_highlight_provider: Some(OneOf::Left(true)),
            document_link_provider: Some(DocumentLinkOptions {
                resolve_provider: Some(false),
                work_done_progress_options: Default::default(),
            }),
            code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
            rename_provider: Some(OneOf::Left(true)),
            color_provider: Some(ColorProviderCapability::Simple(true)),
            folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
            selection_range_provider: Some(SelectionRangeProviderCapability::Simple(true)),
            ..Default::default()
        }
    }

    /// Schedules a debounced validation of the current snapshot of `uri`.
    fn trigger_validation(&self, uri: Url) {
        let router = self.router.clone();
        let target = uri.clone();
        self.validation
            .trigger(uri, move || async move { router.validate(&target).await });
    }

    /// Token for one request; cancelled for good once the server shuts down.
    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

#[tower_lsp::async_trait]
impl<S: LanguageService> LanguageServer for Backend<S> {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.client
            .log_message(MessageType::INFO, "LSP server initializing")
            .await;

        let state = ClientState::from_params(&params);
        let snippet_support = state.snippet_support;
        info!(
            "Client capabilities: snippets={}, scoped settings={}, workspace folders={}",
            state.snippet_support,
            state.scoped_settings_support,
            state.workspace_folders.len()
        );
        self.router.set_client_state(state);

        let options = InitializationOptions::from_params(&params);
        for data in load_custom_data(&options.data_paths).await {
            for (_, service) in self.router.services().iter() {
                service.add_custom_data(&data);
            }
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(snippet_support),
            server_info: Some(ServerInfo {
                name: "stylesheet-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.client
            .log_message(MessageType::INFO, "LSP server shutting down")
            .await;
        self.validation.cancel_all();
        self.router.stylesheets().dispose();
        self.shutdown.cancel();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        debug!("Document opened: {} ({})", item.uri, item.language_id);
        let document = TextDocument::new(item.uri, item.language_id, item.version, item.text);
        let document = self.router.documents().open(document);
        self.trigger_validation(document.uri().clone());
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        if self
            .router
            .documents()
            .change(&uri, version, &params.content_changes)
            .is_none()
        {
            debug!("Ignoring change for unopened document {}", uri);
            return;
        }
        self.trigger_validation(uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("Document closed: {}", uri);
        self.router.documents().close(&uri);
        self.router.close(&uri);
        self.validation.cancel(&uri).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        info!("Configuration changed");
        self.router.configure(&params.settings);
        for document in self.router.documents().all() {
            self.trigger_validation(document.uri().clone());
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        self.router.completion(params, &self.request_token()).await
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        self.router.hover(params, &self.request_token()).await
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        self.router.document_symbol(params, &self.request_token()).await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        self.router.goto_definition(params, &self.request_token()).await
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        self.router.references(params, &self.request_token()).await
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        self.router
            .document_highlight(params, &self.request_token())
            .await
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        self.router.document_link(params, &self.request_token()).await
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        self.router.code_action(params, &self.request_token()).await
    }

    async fn document_color(&self, params: DocumentColorParams) -> Result<Vec<ColorInformation>> {
        self.router.document_color(params, &self.request_token()).await
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> Result<Vec<ColorPresentation>> {
        self.router
            .color_presentation(params, &self.request_token())
            .await
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        self.router.rename(params, &self.request_token()).await
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        self.router.folding_range(params, &self.request_token()).await
    }

    async fn selection_range(
        &self,
        params: SelectionRangeParams,
    ) -> Result<Option<Vec<SelectionRange>>> {
        self.router
            .selection_range(params, &self.request_token())
            .await
    }
}
