//! Parsed artifact cache keyed by document uri and version

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_lsp::lsp_types::Url;
use tracing::{debug, info, warn};

use crate::cache::error::CacheError;
use crate::config::CacheLimits;
use crate::document::TextDocument;
use crate::service::ServiceError;

type Producer<T> = Box<dyn Fn(&TextDocument) -> Result<T, ServiceError> + Send + Sync>;

struct CacheEntry<T> {
    version: i32,
    language_id: String,
    artifact: Arc<T>,
    last_access: Instant,
}

struct CacheState<T> {
    entries: HashMap<Url, CacheEntry<T>>,
    /// Ticket of the latest producer started for each uri
    tickets: HashMap<Url, u64>,
    next_ticket: u64,
    disposed: bool,
}

/// Keeps one artifact per open document.
///
/// An entry is served only while the document's version (and language id)
/// match the ones it was produced from; otherwise the producer runs again.
/// When producers for the same uri overlap, only the one started last may
/// store its result. Eviction happens in [`ArtifactCache::cleanup`], which the
/// background task started by [`ArtifactCache::start_cleanup`] runs
/// periodically.
pub struct ArtifactCache<T> {
    limits: CacheLimits,
    produce: Producer<T>,
    state: Mutex<CacheState<T>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> ArtifactCache<T> {
    pub fn new<F>(limits: CacheLimits, produce: F) -> Self
    where
        F: Fn(&TextDocument) -> Result<T, ServiceError> + Send + Sync + 'static,
    {
        Self {
            limits,
            produce: Box::new(produce),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tickets: HashMap::new(),
                next_ticket: 0,
                disposed: false,
            }),
            cleanup_task: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the artifact for `document`, producing it on a miss or when
    /// the cached entry belongs to another version.
    pub fn get(&self, document: &TextDocument) -> Result<Arc<T>, CacheError> {
        let ticket = {
            let mut state = self.state();
            if state.disposed {
                return Err(CacheError::Disposed);
            }
            if let Some(entry) = state.entries.get_mut(document.uri())
                && entry.version == document.version()
                && entry.language_id == document.language_id()
            {
                entry.last_access = Instant::now();
                return Ok(Arc::clone(&entry.artifact));
            }
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.tickets.insert(document.uri().clone(), ticket);
            ticket
        };

        // Produced outside the lock so other documents stay reachable
        debug!(
            "Producing artifact for {} (version {})",
            document.uri(),
            document.version()
        );
        let artifact = Arc::new((self.produce)(document)?);

        let mut state = self.state();
        if state.disposed {
            return Err(CacheError::Disposed);
        }
        if state.tickets.get(document.uri()) == Some(&ticket) {
            state.entries.insert(
                document.uri().clone(),
                CacheEntry {
                    version: document.version(),
                    language_id: document.language_id().to_string(),
                    artifact: Arc::clone(&artifact),
                    last_access: Instant::now(),
                },
            );
        } else {
            debug!(
                "Discarding artifact for {} (version {}), superseded or removed",
                document.uri(),
                document.version()
            );
        }

        Ok(artifact)
    }

    /// Drops the entry of a closed document.
    pub fn remove(&self, uri: &Url) {
        let mut state = self.state();
        state.tickets.remove(uri);
        if state.entries.remove(uri).is_some() {
            debug!("Removed cached artifact for {}", uri);
        }
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.state().entries.contains_key(uri)
    }

    /// Removes entries idle for longer than the max age, then the least
    /// recently used ones until the cache fits its capacity.
    pub fn cleanup(&self) {
        let mut state = self.state();
        let before = state.entries.len();

        if let Some(max_age) = self.limits.max_age {
            let now = Instant::now();
            state
                .entries
                .retain(|_, entry| now.saturating_duration_since(entry.last_access) <= max_age);
        }

        if let Some(max_entries) = self.limits.max_entries
            && state.entries.len() > max_entries
        {
            let mut by_access: Vec<(Url, Instant)> = state
                .entries
                .iter()
                .map(|(uri, entry)| (uri.clone(), entry.last_access))
                .collect();
            by_access.sort_by_key(|(_, last_access)| *last_access);

            let excess = state.entries.len() - max_entries;
            for (uri, _) in by_access.into_iter().take(excess) {
                state.entries.remove(&uri);
            }
        }

        let removed = before - state.entries.len();
        if removed > 0 {
            debug!("Evicted {} cached artifacts", removed);
        }
    }

    /// Spawns the periodic cleanup task. The task stops on its own once the
    /// cache is dropped or disposed.
    pub fn start_cleanup(self: &Arc<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, artifact cache cleanup disabled");
            return;
        };

        let period = self.limits.cleanup_interval();
        let cache: Weak<Self> = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.cleanup();
            }
        });

        let previous = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Clears every entry and stops the cleanup task. The cache refuses
    /// further requests afterwards.
    pub fn dispose(&self) {
        {
            let mut state = self.state();
            state.disposed = true;
            state.entries.clear();
            state.tickets.clear();
        }
        if let Some(task) = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        info!("Artifact cache disposed");
    }
}
