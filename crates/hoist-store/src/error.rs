use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not a hoist store: {0}")]
    NotAStore(PathBuf),
    #[error("object not found: {scope}/{fingerprint}")]
    ObjectNotFound {
        scope: String,
        fingerprint: hoist_core::Fingerprint,
    },
    #[error("write aborted after {written} of {total} bytes")]
    Aborted { written: u64, total: u64 },
    #[error("invalid scope: {0:?}")]
    InvalidScope(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("core error: {0}")]
    Core(#[from] hoist_core::CoreError),
    #[error("config error: {0}")]
    Config(String),
    #[error("index error: {0}")]
    Index(String),
}
