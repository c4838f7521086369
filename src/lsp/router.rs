//! Request routing: document lookup, engine selection, artifact retrieval and
//! safe dispatch for every protocol request.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::cache::{ArtifactCache, CacheError, ConfigurationProvider, SettingsCache};
use crate::config::CacheLimits;
use crate::document::TextDocument;
use crate::lsp::client_state::ClientState;
use crate::lsp::diagnostics::ValidationReport;
use crate::lsp::dispatch::{run_safe, run_safe_async};
use crate::lsp::documents::DocumentStore;
use crate::service::{
    DocumentContext, LanguageService, LanguageServices, LanguageSettings, ServiceError,
    complete_paths,
};

/// Shared state behind every request handler.
pub struct RequestRouter<S: LanguageService> {
    documents: Arc<DocumentStore>,
    services: Arc<LanguageServices<S>>,
    stylesheets: Arc<ArtifactCache<S::Stylesheet>>,
    settings: Arc<SettingsCache>,
    client_state: Arc<OnceLock<ClientState>>,
}

impl<S: LanguageService> Clone for RequestRouter<S> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            services: Arc::clone(&self.services),
            stylesheets: Arc::clone(&self.stylesheets),
            settings: Arc::clone(&self.settings),
            client_state: Arc::clone(&self.client_state),
        }
    }
}

impl<S: LanguageService> RequestRouter<S> {
    pub fn new(
        services: LanguageServices<S>,
        limits: CacheLimits,
        configuration: Arc<dyn ConfigurationProvider>,
    ) -> Self {
        let services = Arc::new(services);
        let producer = Arc::clone(&services);
        let stylesheets = ArtifactCache::new(limits, move |document: &TextDocument| {
            producer.for_document(document).parse_stylesheet(document)
        });

        Self {
            documents: Arc::new(DocumentStore::new()),
            services,
            stylesheets: Arc::new(stylesheets),
            settings: Arc::new(SettingsCache::new(configuration)),
            client_state: Arc::new(OnceLock::new()),
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn services(&self) -> &LanguageServices<S> {
        &self.services
    }

    pub fn stylesheets(&self) -> &Arc<ArtifactCache<S::Stylesheet>> {
        &self.stylesheets
    }

    pub fn settings(&self) -> &SettingsCache {
        &self.settings
    }

    /// Records the client state; only the first call has an effect.
    pub fn set_client_state(&self, state: ClientState) {
        self.settings
            .set_scoped_settings_support(state.scoped_settings_support);
        if self.client_state.set(state).is_err() {
            debug!("Client state already initialized");
        }
    }

    pub fn client_state(&self) -> ClientState {
        self.client_state.get().cloned().unwrap_or_default()
    }

    /// Validates the current snapshot of `uri`. Returns `None` when the
    /// document is no longer open.
    pub async fn validate(&self, uri: &Url) -> anyhow::Result<Option<ValidationReport>> {
        let Some(document) = self.documents.get(uri) else {
            return Ok(None);
        };
        let settings = self.settings.get(&document).await;

        // The document may have changed or closed during the settings round-trip
        let Some(document) = self.documents.get(uri) else {
            return Ok(None);
        };
        let stylesheet = self.stylesheets.get(&document)?;
        let diagnostics = self.services.for_document(&document).do_validation(
            &document,
            &stylesheet,
            settings.as_deref(),
        )?;

        // A report for a snapshot that was replaced or closed meanwhile is stale
        let current = self.documents.get(uri);
        if !current.is_some_and(|current| Arc::ptr_eq(&current, &document)) {
            debug!("Dropping stale validation of {} (version {})", uri, document.version());
            return Ok(None);
        }

        Ok(Some(ValidationReport {
            diagnostics,
            version: document.version(),
        }))
    }

    /// Pushes a `didChangeConfiguration` snapshot to every engine and drops
    /// every memoized per-document lookup.
    pub fn configure(&self, settings: &Value) {
        for (language_id, service) in self.services.iter() {
            let section = settings.get(language_id).and_then(LanguageSettings::from_value);
            service.configure(section);
        }
        self.settings.clear();
    }

    /// Forgets everything cached for a closed document.
    pub fn close(&self, uri: &Url) {
        self.stylesheets.remove(uri);
        self.settings.remove(uri);
    }

    /// Resolves the document, its engine and its stylesheet, then runs `query`
    /// through [`run_safe`]. A document that is not open yields `fallback`.
    async fn dispatch<T, F>(
        &self,
        label: &str,
        uri: &Url,
        fallback: T,
        token: &CancellationToken,
        query: F,
    ) -> jsonrpc::Result<T>
    where
        T: Clone + Send,
        F: FnOnce(&S, &TextDocument, &S::Stylesheet) -> Result<T, ServiceError> + Send,
    {
        let context = format!("Error while computing {} for {}", label, uri);
        let document = self.documents.get(uri);
        let missing = fallback.clone();

        run_safe(
            move || -> Result<T, CacheError> {
                let Some(document) = document else {
                    debug!("Document {} is not open", uri);
                    return Ok(missing);
                };
                let service = self.services.for_document(&document);
                let stylesheet = self.stylesheets.get(&document)?;
                Ok(query(service.as_ref(), document.as_ref(), stylesheet.as_ref())?)
            },
            fallback,
            &context,
            token,
        )
        .await
    }

    /// Engine completions, preceded by file names when the cursor is inside
    /// a `url()` or import string. Path results mark the list incomplete.
    pub async fn completion(
        &self,
        params: CompletionParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let uri = position.text_document.uri;
        let context_label = format!("Error while computing completions for {}", uri);
        let Some(document) = self.documents.get(&uri) else {
            debug!("Document {} is not open", uri);
            return Ok(None);
        };
        let folders = self.client_state().workspace_folders;

        run_safe_async(
            async {
                let service = self.services.for_document(&document);
                let stylesheet = self.stylesheets.get(&document)?;
                let mut list = service.do_complete(&document, position.position, &stylesheet)?;

                let context = DocumentContext::new(document.uri(), &folders);
                if let Some(mut paths) =
                    complete_paths(&document, position.position, &context).await
                {
                    paths.append(&mut list.items);
                    list = CompletionList {
                        is_incomplete: true,
                        items: paths,
                    };
                }
                Ok::<_, CacheError>(Some(CompletionResponse::List(list)))
            },
            None,
            &context_label,
            token,
        )
        .await
    }

    pub async fn hover(
        &self,
        params: HoverParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<Hover>> {
        let position = params.text_document_position_params;
        self.dispatch(
            "hover",
            &position.text_document.uri,
            None,
            token,
            |service, document, stylesheet| {
                service.do_hover(document, position.position, stylesheet)
            },
        )
        .await
    }

    pub async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        self.dispatch(
            "document symbols",
            &params.text_document.uri,
            Some(DocumentSymbolResponse::Flat(Vec::new())),
            token,
            |service, document, stylesheet| {
                service
                    .find_document_symbols(document, stylesheet)
                    .map(|symbols| Some(DocumentSymbolResponse::Flat(symbols)))
            },
        )
        .await
    }

    pub async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        self.dispatch(
            "definitions",
            &position.text_document.uri,
            None,
            token,
            |service, document, stylesheet| {
                service
                    .find_definition(document, position.position, stylesheet)
                    .map(|location| location.map(GotoDefinitionResponse::Scalar))
            },
        )
        .await
    }

    pub async fn references(
        &self,
        params: ReferenceParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        self.dispatch(
            "references",
            &position.text_document.uri,
            Some(Vec::new()),
            token,
            |service, document, stylesheet| {
                service
                    .find_references(document, position.position, stylesheet)
                    .map(Some)
            },
        )
        .await
    }

    pub async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<Vec<DocumentHighlight>>> {
        let position = params.text_document_position_params;
        self.dispatch(
            "document highlights",
            &position.text_document.uri,
            Some(Vec::new()),
            token,
            |service, document, stylesheet| {
                service
                    .find_document_highlights(document, position.position, stylesheet)
                    .map(Some)
            },
        )
        .await
    }

    /// Links are resolved asynchronously (filesystem probing), so this is the
    /// one query dispatched through [`run_safe_async`].
    pub async fn document_link(
        &self,
        params: DocumentLinkParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<Vec<DocumentLink>>> {
        let uri = params.text_document.uri;
        let context_label = format!("Error while computing document links for {}", uri);
        let Some(document) = self.documents.get(&uri) else {
            return Ok(Some(Vec::new()));
        };
        let folders = self.client_state().workspace_folders;

        run_safe_async(
            async {
                let service = self.services.for_document(&document);
                let stylesheet = self.stylesheets.get(&document)?;
                let context = DocumentContext::new(document.uri(), &folders);
                let links = service
                    .find_document_links(&document, &stylesheet, &context)
                    .await?;
                Ok::<_, CacheError>(Some(links))
            },
            Some(Vec::new()),
            &context_label,
            token,
        )
        .await
    }

    pub async fn code_action(
        &self,
        params: CodeActionParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<CodeActionResponse>> {
        self.dispatch(
            "code actions",
            &params.text_document.uri,
            Some(Vec::new()),
            token,
            |service, document, stylesheet| {
                service
                    .do_code_actions(document, params.range, &params.context, stylesheet)
                    .map(Some)
            },
        )
        .await
    }

    pub async fn document_color(
        &self,
        params: DocumentColorParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Vec<ColorInformation>> {
        self.dispatch(
            "document colors",
            &params.text_document.uri,
            Vec::new(),
            token,
            |service, document, stylesheet| service.find_document_colors(document, stylesheet),
        )
        .await
    }

    pub async fn color_presentation(
        &self,
        params: ColorPresentationParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Vec<ColorPresentation>> {
        self.dispatch(
            "color presentations",
            &params.text_document.uri,
            Vec::new(),
            token,
            |service, document, stylesheet| {
                service.get_color_presentations(document, stylesheet, params.color, params.range)
            },
        )
        .await
    }

    pub async fn rename(
        &self,
        params: RenameParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<WorkspaceEdit>> {
        let position = params.text_document_position;
        self.dispatch(
            "renames",
            &position.text_document.uri,
            None,
            token,
            |service, document, stylesheet| {
                service.do_rename(document, position.position, &params.new_name, stylesheet)
            },
        )
        .await
    }

    pub async fn folding_range(
        &self,
        params: FoldingRangeParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<Vec<FoldingRange>>> {
        let range_limit = self.client_state().folding_range_limit;
        self.dispatch(
            "folding ranges",
            &params.text_document.uri,
            Some(Vec::new()),
            token,
            |service, document, stylesheet| {
                service
                    .get_folding_ranges(document, stylesheet, range_limit)
                    .map(Some)
            },
        )
        .await
    }

    pub async fn selection_range(
        &self,
        params: SelectionRangeParams,
        token: &CancellationToken,
    ) -> jsonrpc::Result<Option<Vec<SelectionRange>>> {
        self.dispatch(
            "selection ranges",
            &params.text_document.uri,
            Some(Vec::new()),
            token,
            |service, document, stylesheet| {
                service
                    .get_selection_ranges(document, &params.positions, stylesheet)
                    .map(Some)
            },
        )
        .await
    }
}
