//! Open document store fed by didOpen / didChange / didClose

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tower_lsp::lsp_types::{TextDocumentContentChangeEvent, Url};

use crate::document::TextDocument;

#[derive(Default)]
pub struct DocumentStore {
    documents: Mutex<IndexMap<Url, Arc<TextDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> MutexGuard<'_, IndexMap<Url, Arc<TextDocument>>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self, document: TextDocument) -> Arc<TextDocument> {
        let document = Arc::new(document);
        self.documents()
            .insert(document.uri().clone(), Arc::clone(&document));
        document
    }

    /// Applies the change events and returns the new snapshot, or `None` if
    /// the document is not open.
    pub fn change(
        &self,
        uri: &Url,
        version: i32,
        changes: &[TextDocumentContentChangeEvent],
    ) -> Option<Arc<TextDocument>> {
        let mut documents = self.documents();
        let current = documents.get(uri)?;
        let updated = Arc::new(current.apply_changes(version, changes));
        documents.insert(uri.clone(), Arc::clone(&updated));
        Some(updated)
    }

    pub fn close(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.documents().shift_remove(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.documents().get(uri).cloned()
    }

    /// Every open document, in the order they were opened.
    pub fn all(&self) -> Vec<Arc<TextDocument>> {
        self.documents().values().cloned().collect()
    }
}
