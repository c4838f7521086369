//! Resolution of relative references found in a document

use tower_lsp::lsp_types::{Url, WorkspaceFolder};

/// Resolves references relative to a document and its workspace folder.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    document_uri: Url,
    root_folder: Option<Url>,
}

impl DocumentContext {
    pub fn new(document_uri: &Url, workspace_folders: &[WorkspaceFolder]) -> Self {
        let root_folder = workspace_folders
            .iter()
            .filter_map(|folder| folder_with_trailing_slash(&folder.uri))
            .find(|folder| document_uri.as_str().starts_with(folder.as_str()));

        Self {
            document_uri: document_uri.clone(),
            root_folder,
        }
    }

    pub fn document_uri(&self) -> &Url {
        &self.document_uri
    }

    /// Absolute paths (`/img/a.png`) resolve against the workspace folder that
    /// contains the document; everything else resolves against `base`, which
    /// defaults to the document itself.
    pub fn resolve_reference(&self, reference: &str, base: Option<&Url>) -> Option<Url> {
        if let Some(path) = reference.strip_prefix('/')
            && let Some(root) = &self.root_folder
        {
            return root.join(path).ok();
        }

        let base = base.unwrap_or(&self.document_uri);
        base.join(reference).ok()
    }
}

fn folder_with_trailing_slash(uri: &Url) -> Option<Url> {
    if uri.as_str().ends_with('/') {
        return Some(uri.clone());
    }
    Url::parse(&format!("{}/", uri)).ok()
}
