use std::path::PathBuf;
use std::time::Duration;

/// Debounce window between the last edit of a document and its validation
pub const DEFAULT_VALIDATION_DELAY_MS: u64 = 500;

/// Maximum number of parsed stylesheets kept in memory
pub const DEFAULT_MAX_CACHED_STYLESHEETS: usize = 10;

/// Parsed stylesheets not accessed for this long are dropped (seconds)
pub const DEFAULT_STYLESHEET_MAX_AGE_SECS: u64 = 60;

/// Shortest period of the artifact cache cleanup task
const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

/// Limits applied by the artifact cache cleanup pass.
/// `None` disables the corresponding eviction axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    pub max_entries: Option<usize>,
    pub max_age: Option<Duration>,
}

impl CacheLimits {
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_age: None,
        }
    }

    /// Cleanup runs once per max age, or once a minute when age is unbounded.
    /// A zero max age still yields a non-zero period.
    pub fn cleanup_interval(&self) -> Duration {
        self.max_age
            .unwrap_or(Duration::from_secs(DEFAULT_STYLESHEET_MAX_AGE_SECS))
            .max(MIN_CLEANUP_INTERVAL)
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MAX_CACHED_STYLESHEETS),
            max_age: Some(Duration::from_secs(DEFAULT_STYLESHEET_MAX_AGE_SECS)),
        }
    }
}

/// Tunables of the request-handling core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub validation_delay: Duration,
    pub cache_limits: CacheLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            validation_delay: Duration::from_millis(DEFAULT_VALIDATION_DELAY_MS),
            cache_limits: CacheLimits::default(),
        }
    }
}

/// Returns the path to the data directory for stylesheet-lsp.
/// Uses $XDG_DATA_HOME/stylesheet-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/stylesheet-lsp,
/// or ./stylesheet-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Name of the log file inside the data directory.
pub const LOG_FILE_NAME: &str = "stylesheet-lsp.log";

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("stylesheet-lsp")
}
