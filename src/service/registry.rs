//! Language id -> analysis engine lookup

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::document::TextDocument;
use crate::service::traits::LanguageService;

/// Language id used when a document's language is not registered
pub const DEFAULT_LANGUAGE_ID: &str = "css";

/// Registered analysis engines, fixed once the server is built.
pub struct LanguageServices<S> {
    services: HashMap<String, Arc<S>>,
    default: Arc<S>,
}

impl<S: LanguageService> LanguageServices<S> {
    /// Creates a registry whose default engine serves `css`.
    pub fn new(default: S) -> Self {
        let default = Arc::new(default);
        let services = HashMap::from([(DEFAULT_LANGUAGE_ID.to_string(), Arc::clone(&default))]);
        Self { services, default }
    }

    pub fn with(mut self, language_id: impl Into<String>, service: S) -> Self {
        self.services.insert(language_id.into(), Arc::new(service));
        self
    }

    /// Returns the engine for `language_id`, falling back to the default one.
    pub fn get(&self, language_id: &str) -> &Arc<S> {
        match self.services.get(language_id) {
            Some(service) => service,
            None => {
                info!(
                    "Document type is {}, using {} instead.",
                    language_id, DEFAULT_LANGUAGE_ID
                );
                &self.default
            }
        }
    }

    pub fn for_document(&self, document: &TextDocument) -> &Arc<S> {
        self.get(document.language_id())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<S>)> {
        self.services.iter().map(|(id, service)| (id.as_str(), service))
    }
}
