//! What the client told us at initialize time

use serde::Deserialize;
use tower_lsp::lsp_types::{InitializeParams, Url, WorkspaceFolder};
use tracing::warn;

/// `initializationOptions` understood by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializationOptions {
    /// Custom data files to load into every engine
    pub data_paths: Vec<String>,
}

impl InitializationOptions {
    pub fn from_params(params: &InitializeParams) -> Self {
        let Some(value) = &params.initialization_options else {
            return Self::default();
        };
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("Ignoring malformed initializationOptions: {}", e);
            Self::default()
        })
    }
}

/// Client capabilities and workspace layout, fixed after initialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub workspace_folders: Vec<WorkspaceFolder>,
    pub snippet_support: bool,
    pub scoped_settings_support: bool,
    pub folding_range_limit: usize,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            workspace_folders: Vec::new(),
            snippet_support: false,
            scoped_settings_support: false,
            folding_range_limit: usize::MAX,
        }
    }
}

impl ClientState {
    pub fn from_params(params: &InitializeParams) -> Self {
        let capabilities = &params.capabilities;

        let snippet_support = capabilities
            .text_document
            .as_ref()
            .and_then(|text_document| text_document.completion.as_ref())
            .and_then(|completion| completion.completion_item.as_ref())
            .and_then(|item| item.snippet_support)
            .unwrap_or(false);

        let scoped_settings_support = capabilities
            .workspace
            .as_ref()
            .and_then(|workspace| workspace.configuration)
            .unwrap_or(false);

        let folding_range_limit = capabilities
            .text_document
            .as_ref()
            .and_then(|text_document| text_document.folding_range.as_ref())
            .and_then(|folding| folding.range_limit)
            .map_or(usize::MAX, |limit| limit as usize);

        Self {
            workspace_folders: workspace_folders(params),
            snippet_support,
            scoped_settings_support,
            folding_range_limit,
        }
    }
}

/// Explicit workspace folders, else a single folder built from the root.
fn workspace_folders(params: &InitializeParams) -> Vec<WorkspaceFolder> {
    if let Some(folders) = &params.workspace_folders
        && !folders.is_empty()
    {
        return folders.clone();
    }

    #[allow(deprecated)]
    let root = params.root_uri.clone().or_else(|| {
        params
            .root_path
            .as_deref()
            .and_then(|path| Url::from_directory_path(path).ok())
    });

    root.map(|uri| {
        let name = uri
            .path_segments()
            .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
            .unwrap_or_default()
            .to_string();
        vec![WorkspaceFolder { uri, name }]
    })
    .unwrap_or_default()
}
