//! Per-document settings memo

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use serde_json::Value;
use tower_lsp::Client;
use tower_lsp::lsp_types::{ConfigurationItem, Url};
use tracing::{debug, warn};

use crate::document::TextDocument;
use crate::service::LanguageSettings;

/// Settings lookup that may still be in flight. Cloning shares the lookup.
pub type SharedSettings = Shared<BoxFuture<'static, Option<Arc<LanguageSettings>>>>;

/// Source of scoped configuration (`workspace/configuration`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigurationProvider: Send + Sync + 'static {
    async fn request_configuration(
        &self,
        item: ConfigurationItem,
    ) -> tower_lsp::jsonrpc::Result<Option<Value>>;
}

#[async_trait]
impl ConfigurationProvider for Client {
    async fn request_configuration(
        &self,
        item: ConfigurationItem,
    ) -> tower_lsp::jsonrpc::Result<Option<Value>> {
        let values = self.configuration(vec![item]).await?;
        Ok(values.into_iter().next())
    }
}

/// Memoizes one settings lookup per document until invalidated.
pub struct SettingsCache {
    provider: Arc<dyn ConfigurationProvider>,
    scoped_settings_support: AtomicBool,
    memo: Mutex<HashMap<Url, SharedSettings>>,
}

impl SettingsCache {
    pub fn new(provider: Arc<dyn ConfigurationProvider>) -> Self {
        Self {
            provider,
            scoped_settings_support: AtomicBool::new(false),
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the client answers `workspace/configuration`; set once at
    /// initialize.
    pub fn set_scoped_settings_support(&self, supported: bool) {
        self.scoped_settings_support
            .store(supported, Ordering::Relaxed);
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<Url, SharedSettings>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the settings lookup for `document`, issuing a configuration
    /// request scoped to its uri and language on first use.
    pub fn get(&self, document: &TextDocument) -> SharedSettings {
        if !self.scoped_settings_support.load(Ordering::Relaxed) {
            return future::ready(None).boxed().shared();
        }

        let mut memo = self.memo();
        if let Some(settings) = memo.get(document.uri()) {
            return settings.clone();
        }

        let provider = Arc::clone(&self.provider);
        let uri = document.uri().clone();
        let item = ConfigurationItem {
            scope_uri: Some(uri.clone()),
            section: Some(document.language_id().to_string()),
        };
        let settings = async move {
            debug!("Requesting settings for {}", uri);
            match provider.request_configuration(item).await {
                Ok(Some(value)) => LanguageSettings::from_value(&value).map(Arc::new),
                Ok(None) => None,
                Err(e) => {
                    warn!("Failed to fetch settings for {}: {}", uri, e);
                    None
                }
            }
        }
        .boxed()
        .shared();

        memo.insert(document.uri().clone(), settings.clone());
        settings
    }

    /// Drops every memoized lookup, including ones still in flight.
    pub fn clear(&self) {
        *self.memo() = HashMap::new();
    }

    pub fn remove(&self, uri: &Url) {
        self.memo().remove(uri);
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.memo().contains_key(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tower_lsp::jsonrpc;

    fn document(uri: &str, language_id: &str) -> TextDocument {
        TextDocument::new(Url::parse(uri).unwrap(), language_id, 1, "a {}")
    }

    fn cache(provider: MockConfigurationProvider, supported: bool) -> SettingsCache {
        let cache = SettingsCache::new(Arc::new(provider));
        cache.set_scoped_settings_support(supported);
        cache
    }

    #[tokio::test]
    async fn get_without_scoped_support_resolves_to_none() {
        let mut provider = MockConfigurationProvider::new();
        provider.expect_request_configuration().never();
        let cache = cache(provider, false);

        let settings = cache.get(&document("file:///a.css", "css")).await;

        assert_eq!(settings, None);
    }

    #[tokio::test]
    async fn get_requests_scoped_section_once() {
        let mut provider = MockConfigurationProvider::new();
        provider
            .expect_request_configuration()
            .withf(|item| {
                item.scope_uri.as_ref().map(Url::as_str) == Some("file:///b.scss")
                    && item.section.as_deref() == Some("scss")
            })
            .times(1)
            .returning(|_| Ok(Some(json!({ "validate": false }))));
        let cache = cache(provider, true);
        let doc = document("file:///b.scss", "scss");

        let first = cache.get(&doc);
        let second = cache.get(&doc);

        let first = first.await.unwrap();
        assert!(!first.validate);
        assert!(Arc::ptr_eq(&first, &second.await.unwrap()));
    }

    #[tokio::test]
    async fn clear_discards_every_memoized_lookup() {
        let mut provider = MockConfigurationProvider::new();
        provider
            .expect_request_configuration()
            .times(2)
            .returning(|_| Ok(Some(json!({}))));
        let cache = cache(provider, true);
        let doc = document("file:///a.css", "css");

        cache.get(&doc).await;
        cache.clear();
        assert!(!cache.contains(doc.uri()));
        cache.get(&doc).await;
    }

    #[tokio::test]
    async fn remove_discards_only_that_document() {
        let mut provider = MockConfigurationProvider::new();
        provider
            .expect_request_configuration()
            .times(3)
            .returning(|_| Ok(Some(json!({}))));
        let cache = cache(provider, true);
        let a = document("file:///a.css", "css");
        let b = document("file:///b.css", "css");
        cache.get(&a).await;
        cache.get(&b).await;

        cache.remove(a.uri());

        assert!(!cache.contains(a.uri()));
        assert!(cache.contains(b.uri()));
        cache.get(&a).await;
        cache.get(&b).await;
    }

    #[tokio::test]
    async fn failed_request_resolves_to_none() {
        let mut provider = MockConfigurationProvider::new();
        provider
            .expect_request_configuration()
            .returning(|_| Err(jsonrpc::Error::internal_error()));
        let cache = cache(provider, true);

        let settings = cache.get(&document("file:///a.css", "css")).await;

        assert_eq!(settings, None);
    }
}
