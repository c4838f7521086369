use thiserror::Error;

use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Artifact cache has been disposed")]
    Disposed,

    #[error(transparent)]
    Produce(#[from] ServiceError),
}
