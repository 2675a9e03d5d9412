use common::{ChannelConflict, DomainError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("insufficient data at offset {offset}: expected at least {expected} bytes, got {actual}")]
    InsufficientData {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported sensor type {type_id} on channel {channel}")]
    UnsupportedType { channel: u8, type_id: u8 },

    #[error(transparent)]
    ChannelConflict(#[from] ChannelConflict),
}

pub type Result<T> = std::result::Result<T, PayloadError>;

impl From<PayloadError> for DomainError {
    fn from(err: PayloadError) -> Self {
        DomainError::MalformedPayload(err.to_string())
    }
}
