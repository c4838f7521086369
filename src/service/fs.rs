//! Filesystem stat provider used by engines to resolve imports

use std::io::ErrorKind;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tower_lsp::lsp_types::Url;

use crate::service::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    File,
    Directory,
    SymbolicLink,
}

/// Result of a stat call. Times are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub file_type: FileType,
    pub ctime: i64,
    pub mtime: i64,
    pub size: i64,
}

impl FileStat {
    /// Stat of a path that does not exist
    pub fn missing() -> Self {
        Self {
            file_type: FileType::Unknown,
            ctime: -1,
            mtime: -1,
            size: -1,
        }
    }
}

#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    async fn stat(&self, uri: &Url) -> Result<FileStat, ServiceError>;
}

/// Stats `file:` URIs on the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystemProvider for LocalFileSystem {
    async fn stat(&self, uri: &Url) -> Result<FileStat, ServiceError> {
        let path = uri
            .to_file_path()
            .map_err(|_| ServiceError::InvalidUri(uri.to_string()))?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FileStat::missing()),
            Err(e) => return Err(e.into()),
        };

        let file_type = if metadata.is_file() {
            FileType::File
        } else if metadata.is_dir() {
            FileType::Directory
        } else if metadata.is_symlink() {
            FileType::SymbolicLink
        } else {
            FileType::Unknown
        };

        Ok(FileStat {
            file_type,
            ctime: epoch_millis(metadata.created().ok()),
            mtime: epoch_millis(metadata.modified().ok()),
            size: metadata.len() as i64,
        })
    }
}

fn epoch_millis(time: Option<SystemTime>) -> i64 {
    time.map(|t| DateTime::<Utc>::from(t).timestamp_millis())
        .unwrap_or(-1)
}
