use hoist_core::ItemId;
use hoist_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the public queue API. Failures of individual items never
/// show up here; they are recorded on the item instead.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown item: {0}")]
    UnknownItem(ItemId),
    #[error("no tokio runtime available to drive uploads")]
    NoRuntime,
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("rejected by remote: {0}")]
    Rejected(String),
    #[error("transfer cancelled")]
    Cancelled,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) => ErrorKind::Transient,
            Self::Rejected(_) => ErrorKind::Validation,
            Self::Cancelled => ErrorKind::Internal,
            Self::Store(StoreError::Io(_)) => ErrorKind::Transient,
            Self::Store(StoreError::InvalidScope(_)) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Transient,
    Validation,
    Reconciliation,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ItemError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reconciliation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

impl From<&TransportError> for ItemError {
    fn from(err: &TransportError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}
