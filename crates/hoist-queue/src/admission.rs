use std::sync::Arc;

use hoist_core::{
    fingerprint, Fingerprint, ItemId, ItemStatus, MediaKind, Payload, StoredObject,
    UploadMetadata,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ItemError;
use crate::item::{now_ms, Item};
use crate::queue::{Shared, SubmitOptions};

/// Result of preparing one item off the calling path.
enum Prepared {
    Ready {
        fingerprint: Fingerprint,
        duplicate_of: Option<StoredObject>,
    },
    Failed(ItemError),
    Cancelled,
}

struct PrepareJob {
    id: ItemId,
    payload: Payload,
    metadata: UploadMetadata,
    force_upload: bool,
    cancel: CancellationToken,
}

impl Shared {
    pub(crate) fn admit<F>(
        self: &Arc<Self>,
        payloads: Vec<Payload>,
        mut metadata: F,
        options: SubmitOptions,
    ) -> Vec<ItemId>
    where
        F: FnMut(&Payload, usize) -> UploadMetadata,
    {
        if payloads.is_empty() {
            return Vec::new();
        }

        let now = self.clock.now();
        let mut ids = Vec::with_capacity(payloads.len());
        let mut jobs = Vec::with_capacity(payloads.len());
        {
            let mut state = self.state.lock();
            if state.is_settled() {
                state.last_batch = None;
            }
            for (index, payload) in payloads.into_iter().enumerate() {
                let meta = metadata(&payload, index);
                let id = ItemId::new();
                let item = Item::new(id, payload.clone(), meta.clone(), options.force_upload, now);
                jobs.push(PrepareJob {
                    id,
                    payload,
                    metadata: meta,
                    force_upload: options.force_upload,
                    cancel: item.cancel.clone(),
                });
                state.insert(item);
                ids.push(id);
            }
        }
        tracing::debug!("admitted {} items", ids.len());

        // Items are prepared concurrently but enter `queued` in submission
        // order.
        let handles: Vec<(ItemId, JoinHandle<Prepared>)> = jobs
            .into_iter()
            .map(|job| {
                let shared = Arc::clone(self);
                let id = job.id;
                (id, self.runtime.spawn(async move { shared.prepare(job).await }))
            })
            .collect();

        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            for (id, handle) in handles {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Prepared::Failed(ItemError::internal(format!(
                        "preparation task failed: {e}"
                    ))),
                };
                shared.finish_preparation(id, outcome);
            }
        });

        ids
    }

    async fn prepare(self: Arc<Self>, job: PrepareJob) -> Prepared {
        if let Err(e) = job.metadata.validate() {
            return Prepared::Failed(ItemError::validation(e.to_string()));
        }

        let media = MediaKind::sniff(job.payload.bytes());
        {
            let mut state = self.state.lock();
            if let Some(item) = state.items.get_mut(&job.id) {
                item.media = Some(media);
            }
        }

        if job.cancel.is_cancelled() {
            return Prepared::Cancelled;
        }

        let bytes = job.payload.bytes().clone();
        let fp = match tokio::task::spawn_blocking(move || fingerprint(&bytes)).await {
            Ok(fp) => fp,
            Err(e) => return Prepared::Failed(ItemError::internal(format!("hashing failed: {e}"))),
        };

        if job.cancel.is_cancelled() {
            return Prepared::Cancelled;
        }

        let duplicate_of = if job.force_upload {
            None
        } else {
            match self.inventory.find_by_hash(&job.metadata.scope, &fp).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("duplicate precheck failed for {}, uploading anyway: {e}", job.id);
                    None
                }
            }
        };

        Prepared::Ready {
            fingerprint: fp,
            duplicate_of,
        }
    }

    fn finish_preparation(self: &Arc<Self>, id: ItemId, outcome: Prepared) {
        {
            let mut state = self.state.lock();
            let Some(item) = state.items.get_mut(&id) else {
                return;
            };
            if item.status != ItemStatus::Preparing {
                // Cancelled while preparing.
                return;
            }
            match outcome {
                Prepared::Ready {
                    fingerprint,
                    duplicate_of: Some(existing),
                } => {
                    item.fingerprint = Some(fingerprint);
                    item.ended_at_ms = Some(now_ms());
                    tracing::debug!("{id} is a duplicate of {}", existing.key);
                    item.duplicate_of = Some(existing);
                    state.set_status(id, ItemStatus::Duplicate);
                }
                Prepared::Ready {
                    fingerprint,
                    duplicate_of: None,
                } => {
                    item.fingerprint = Some(fingerprint);
                    if state.set_status(id, ItemStatus::Queued) {
                        state.pending.push_back(id);
                    }
                }
                Prepared::Failed(err) => {
                    tracing::warn!("{id} failed preparation: {err}");
                    item.ended_at_ms = Some(now_ms());
                    item.last_error = Some(err);
                    state.set_status(id, ItemStatus::Error);
                }
                Prepared::Cancelled => {
                    item.ended_at_ms = Some(now_ms());
                    state.set_status(id, ItemStatus::Cancelled);
                }
            }
        }
        self.pump();
        self.after_change();
    }
}
