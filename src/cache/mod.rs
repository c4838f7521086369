// Cache layer
// - artifact.rs: Parsed stylesheet cache keyed by document uri + version
// - settings.rs: Per-document settings memo

pub mod artifact;
pub mod error;
pub mod settings;

pub use artifact::ArtifactCache;
pub use error::CacheError;
pub use settings::{ConfigurationProvider, SettingsCache};
