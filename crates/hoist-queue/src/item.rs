use std::time::{SystemTime, UNIX_EPOCH};

use hoist_core::{
    Fingerprint, ItemId, ItemStatus, MediaKind, Payload, StoredObject, UploadMetadata,
};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ItemError;
use crate::retry::RetryPolicy;

pub(crate) struct Item {
    pub id: ItemId,
    pub payload: Payload,
    pub metadata: UploadMetadata,
    pub status: ItemStatus,
    pub progress: u8,
    pub retry_count: u32,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub last_error: Option<ItemError>,
    pub duplicate_of: Option<StoredObject>,
    pub stored: Option<StoredObject>,
    pub fingerprint: Option<Fingerprint>,
    pub media: Option<MediaKind>,
    pub force_upload: bool,
    pub cancel: CancellationToken,
    pub cancel_requested: bool,
    /// Bumped on every dispatch; completions and progress from an older
    /// attempt are ignored.
    pub attempt: u32,
    pub retry_pending: bool,
    pub last_progress_at: Instant,
}

impl Item {
    pub fn new(
        id: ItemId,
        payload: Payload,
        metadata: UploadMetadata,
        force_upload: bool,
        now: Instant,
    ) -> Self {
        Self {
            id,
            payload,
            metadata,
            status: ItemStatus::Preparing,
            progress: 0,
            retry_count: 0,
            started_at_ms: None,
            ended_at_ms: None,
            last_error: None,
            duplicate_of: None,
            stored: None,
            fingerprint: None,
            media: None,
            force_upload,
            cancel: CancellationToken::new(),
            cancel_requested: false,
            attempt: 0,
            retry_pending: false,
            last_progress_at: now,
        }
    }

    /// No further automatic transition will happen: the item is neither in
    /// the pipeline nor waiting on a retry timer.
    pub fn is_settled(&self) -> bool {
        !self.status.is_active() && !self.retry_pending
    }

    /// Nothing, not even a caller, can move the item any further. A
    /// `duplicate` can still be force-uploaded and an `error` with retries
    /// left can still be retried by hand, so neither counts.
    pub fn is_terminal(&self, policy: &RetryPolicy) -> bool {
        match self.status {
            ItemStatus::Uploaded | ItemStatus::Cancelled => true,
            ItemStatus::Error => {
                !self.retry_pending
                    && (policy.is_exhausted(self.retry_count) || self.fingerprint.is_none())
            }
            _ => false,
        }
    }

    pub fn snapshot(&self, policy: &RetryPolicy) -> ItemSnapshot {
        ItemSnapshot {
            id: self.id,
            name: self.payload.name().to_string(),
            size: self.payload.len() as u64,
            scope: self.metadata.scope.clone(),
            media: self.media,
            status: self.status,
            progress: self.progress,
            retry_count: self.retry_count,
            retries_exhausted: self.status == ItemStatus::Error
                && policy.is_exhausted(self.retry_count),
            retry_pending: self.retry_pending,
            cancel_requested: self.cancel_requested,
            started_at_ms: self.started_at_ms,
            ended_at_ms: self.ended_at_ms,
            last_error: self.last_error.clone(),
            duplicate_of: self.duplicate_of.clone(),
            stored: self.stored.clone(),
            fingerprint: self.fingerprint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    pub size: u64,
    pub scope: String,
    pub media: Option<MediaKind>,
    pub status: ItemStatus,
    pub progress: u8,
    pub retry_count: u32,
    pub retries_exhausted: bool,
    pub retry_pending: bool,
    pub cancel_requested: bool,
    pub started_at_ms: Option<u64>,
    pub ended_at_ms: Option<u64>,
    pub last_error: Option<ItemError>,
    pub duplicate_of: Option<StoredObject>,
    pub stored: Option<StoredObject>,
    pub fingerprint: Option<Fingerprint>,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
