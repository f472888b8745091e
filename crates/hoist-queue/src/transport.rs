use std::sync::Arc;

use async_trait::async_trait;
use hoist_core::{Fingerprint, ItemId, MediaKind, Payload, StoredObject, UploadMetadata};
use tokio_util::sync::CancellationToken;

use crate::error::{InventoryError, TransportError};

pub struct UploadRequest {
    pub id: ItemId,
    pub payload: Payload,
    pub metadata: UploadMetadata,
    pub fingerprint: Fingerprint,
    pub media: MediaKind,
    pub progress: ProgressHandle,
    /// Cooperative cancellation. Transports should check it at least once per
    /// progress report and return [`TransportError::Cancelled`] promptly.
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<StoredObject, TransportError>;
}

/// Answers whether the remote side already holds an object. Called
/// concurrently for many items; a miss is `Ok(None)`, not an error.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn find_by_hash(
        &self,
        scope: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredObject>, InventoryError>;
}

pub(crate) trait ProgressSink: Send + Sync {
    fn report(&self, id: ItemId, attempt: u32, percent: u8);
}

struct Detached;

impl ProgressSink for Detached {
    fn report(&self, _id: ItemId, _attempt: u32, _percent: u8) {}
}

/// Progress callback handed to a transport for one attempt. Reports from a
/// stale attempt, or lower than what was already reported, are ignored.
#[derive(Clone)]
pub struct ProgressHandle {
    sink: Arc<dyn ProgressSink>,
    id: ItemId,
    attempt: u32,
}

impl ProgressHandle {
    pub(crate) fn new(sink: Arc<dyn ProgressSink>, id: ItemId, attempt: u32) -> Self {
        Self { sink, id, attempt }
    }

    pub fn detached() -> Self {
        Self::new(Arc::new(Detached), ItemId::new(), 0)
    }

    pub fn report(&self, percent: u8) {
        self.sink.report(self.id, self.attempt, percent.min(100));
    }

    pub fn report_bytes(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total).saturating_mul(100) / total) as u8
        };
        self.report(percent);
    }
}
