use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
    #[error("invalid item ID: {0}")]
    InvalidItemId(String),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("unknown item status: {0}")]
    UnknownStatus(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
