use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Codec not found: {0}")]
    CodecNotFound(String),

    #[error("No codec bound to device: {0}")]
    CodecBindingNotFound(String),

    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
