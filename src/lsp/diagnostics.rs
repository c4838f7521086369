//! Debounced validation and diagnostics publishing

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tower_lsp::Client;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tracing::{debug, error};

use crate::lsp::dispatch::{format_error, panic_message};

/// Sink for `textDocument/publishDiagnostics`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiagnosticsPublisher: Send + Sync + 'static {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>);
}

#[async_trait]
impl DiagnosticsPublisher for Client {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diagnostics, version).await;
    }
}

/// Diagnostics computed for one document version
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub version: i32,
}

struct PendingValidation {
    id: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<Url, PendingValidation>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<Url, PendingValidation>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coalesces bursts of edits into one validation per document.
///
/// Every trigger replaces the document's pending timer. Once a timer fires
/// it leaves the pending set, so later triggers never abort a validation
/// that is already running.
pub struct ValidationScheduler {
    delay: Duration,
    publisher: Arc<dyn DiagnosticsPublisher>,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl ValidationScheduler {
    pub fn new(delay: Duration, publisher: Arc<dyn DiagnosticsPublisher>) -> Self {
        Self {
            delay,
            publisher,
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedules `validate` to run once `uri` has been quiet for the debounce
    /// delay. `validate` resolves to `None` when there is nothing to publish.
    pub fn trigger<F, Fut>(&self, uri: Url, validate: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<ValidationReport>>> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let publisher = Arc::clone(&self.publisher);
        let pending = Arc::clone(&self.pending);
        let task_uri = uri.clone();

        // Held until the new entry is stored so the timer cannot fire unseen
        let mut entries = lock(&self.pending);
        if let Some(previous) = entries.remove(&uri) {
            previous.handle.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut entries = lock(&pending);
                if entries.get(&task_uri).map(|entry| entry.id) != Some(id) {
                    return;
                }
                entries.remove(&task_uri);
            }
            run_validation(task_uri, validate, publisher.as_ref()).await;
        });

        entries.insert(uri, PendingValidation { id, handle });
    }

    /// Drops the pending validation of a closed document and clears its
    /// diagnostics on the client.
    pub async fn cancel(&self, uri: &Url) {
        let removed = lock(&self.pending).remove(uri);
        if let Some(pending) = removed {
            pending.handle.abort();
            debug!("Cancelled pending validation for {}", uri);
        }
        self.publisher.publish(uri.clone(), Vec::new(), None).await;
    }

    /// Aborts every pending timer without publishing anything.
    pub fn cancel_all(&self) {
        for (_, pending) in lock(&self.pending).drain() {
            pending.handle.abort();
        }
    }

    pub fn is_pending(&self, uri: &Url) -> bool {
        lock(&self.pending).contains_key(uri)
    }
}

async fn run_validation<F, Fut>(uri: Url, validate: F, publisher: &dyn DiagnosticsPublisher)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<ValidationReport>>>,
{
    let context = format!("Error while validating {}", uri);
    match AssertUnwindSafe(async move { validate().await })
        .catch_unwind()
        .await
    {
        Ok(Ok(Some(report))) => {
            debug!(
                "Publishing {} diagnostics for {} (version {})",
                report.diagnostics.len(),
                uri,
                report.version
            );
            publisher
                .publish(uri, report.diagnostics, Some(report.version))
                .await;
        }
        Ok(Ok(None)) => debug!("Nothing to validate for {}", uri),
        Ok(Err(e)) => error!("{}", format_error(&context, format!("{:#}", e))),
        Err(payload) => error!("{}", format_error(&context, panic_message(payload.as_ref()))),
    }
}
