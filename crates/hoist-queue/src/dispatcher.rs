use std::sync::Arc;
use std::time::Duration;

use hoist_core::{ItemId, ItemStatus, MediaKind, StoredObject};
use tokio_util::sync::CancellationToken;

use crate::error::{ItemError, TransportError};
use crate::events::QueueEvent;
use crate::item::now_ms;
use crate::queue::Shared;
use crate::state::QueueState;
use crate::transport::{ProgressHandle, ProgressSink, UploadRequest};

impl QueueState {
    /// Move queued items into free slots, in queue order. Returns the
    /// requests to launch; the items are already `uploading` when this
    /// returns, so a concurrent caller cannot hand out the same slot.
    fn admit_ready(
        &mut self,
        concurrency: usize,
        sink: &Arc<Shared>,
        now: tokio::time::Instant,
    ) -> Vec<(ItemId, u32, UploadRequest)> {
        let mut launches = Vec::new();
        while self.processing.len() < concurrency {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let Some(item) = self.items.get_mut(&id) else {
                continue;
            };
            if item.status != ItemStatus::Queued {
                continue;
            }
            let Some(fingerprint) = item.fingerprint else {
                tracing::error!("queued item {id} has no fingerprint");
                continue;
            };
            item.attempt += 1;
            item.progress = 0;
            item.cancel_requested = false;
            item.started_at_ms = Some(now_ms());
            item.ended_at_ms = None;
            item.last_progress_at = now;
            let attempt = item.attempt;
            let request = UploadRequest {
                id,
                payload: item.payload.clone(),
                metadata: item.metadata.clone(),
                fingerprint,
                media: item.media.unwrap_or(MediaKind::Other),
                progress: ProgressHandle::new(
                    Arc::clone(sink) as Arc<dyn ProgressSink>,
                    id,
                    attempt,
                ),
                cancel: item.cancel.clone(),
            };
            self.processing.insert(id);
            self.set_status(id, ItemStatus::Uploading);
            launches.push((id, attempt, request));
        }
        launches
    }
}

impl Shared {
    pub(crate) fn pump(self: &Arc<Self>) {
        let now = self.clock.now();
        let launches = {
            let mut state = self.state.lock();
            state.admit_ready(self.config.concurrency, self, now)
        };
        for (id, attempt, request) in launches {
            tracing::debug!("dispatching {id} (attempt {attempt})");
            let shared = Arc::clone(self);
            self.runtime.spawn(async move {
                let cancel = request.cancel.clone();
                let outcome = shared.run_transfer(request, &cancel).await;
                shared.complete(id, attempt, outcome);
            });
        }
    }

    async fn run_transfer(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<StoredObject, TransportError> {
        let transfer = self.transport.upload(request);
        tokio::pin!(transfer);
        tokio::select! {
            result = &mut transfer => result,
            _ = self.cancel_deadline(cancel) => {
                tracing::warn!("transport ignored cancellation, dropping transfer");
                Err(TransportError::Cancelled)
            }
        }
    }

    async fn cancel_deadline(&self, cancel: &CancellationToken) {
        cancel.cancelled().await;
        self.clock.sleep(self.config.cancel_grace()).await;
    }

    fn complete(
        self: &Arc<Self>,
        id: ItemId,
        attempt: u32,
        outcome: Result<StoredObject, TransportError>,
    ) {
        let mut retry = None;
        {
            let mut state = self.state.lock();
            let Some(item) = state.items.get_mut(&id) else {
                state.processing.remove(&id);
                drop(state);
                self.pump();
                return;
            };
            if item.attempt != attempt || item.status != ItemStatus::Uploading {
                tracing::debug!("ignoring stale completion for {id} (attempt {attempt})");
                return;
            }
            item.ended_at_ms = Some(now_ms());
            let cancelled = item.cancel.is_cancelled();
            match outcome {
                Ok(stored) => {
                    if cancelled {
                        tracing::debug!("{id} finished before observing cancellation");
                    }
                    item.progress = 100;
                    item.stored = Some(stored);
                    state.emit(QueueEvent::Progress { id, percent: 100 });
                    state.set_status(id, ItemStatus::Uploaded);
                }
                Err(_) if cancelled => {
                    item.last_error = None;
                    state.set_status(id, ItemStatus::Cancelled);
                }
                Err(TransportError::Cancelled) => {
                    item.last_error = None;
                    state.set_status(id, ItemStatus::Cancelled);
                }
                Err(err) => {
                    let error = ItemError::from(&err);
                    tracing::warn!("upload of {id} failed: {err}");
                    if self.policy.should_retry(item.retry_count, &error) {
                        let delay = self.policy.backoff_delay(item.retry_count);
                        let next = item.retry_count + 1;
                        item.retry_pending = true;
                        retry = Some(delay);
                        tracing::info!("retrying {id} in {delay:?} (retry {next})");
                        item.last_error = Some(error);
                        state.set_status(id, ItemStatus::Error);
                        state.emit(QueueEvent::RetryScheduled {
                            id,
                            retry: next,
                            delay,
                        });
                    } else {
                        item.last_error = Some(error);
                        state.set_status(id, ItemStatus::Error);
                    }
                }
            }
            state.processing.remove(&id);
        }
        if let Some(delay) = retry {
            self.schedule_retry(id, attempt, delay);
        }
        self.pump();
        self.after_change();
    }

    fn schedule_retry(self: &Arc<Self>, id: ItemId, attempt: u32, delay: Duration) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            shared.clock.sleep(delay).await;
            shared.fire_retry(id, attempt);
        });
    }

    fn fire_retry(self: &Arc<Self>, id: ItemId, attempt: u32) {
        {
            let mut state = self.state.lock();
            let Some(item) = state.items.get(&id) else {
                return;
            };
            // Cancelled, retried by hand, or re-dispatched in the meantime.
            if item.status != ItemStatus::Error || item.attempt != attempt || !item.retry_pending {
                return;
            }
            state.requeue(id);
        }
        self.pump();
    }
}

impl ProgressSink for Shared {
    fn report(&self, id: ItemId, attempt: u32, percent: u8) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(item) = state.items.get_mut(&id) else {
            return;
        };
        if item.attempt != attempt || item.status != ItemStatus::Uploading || item.cancel_requested
        {
            return;
        }
        // 100 is reserved for `uploaded`.
        let percent = percent.min(99);
        if percent <= item.progress {
            return;
        }
        item.progress = percent;
        item.last_progress_at = now;
        state.emit(QueueEvent::Progress { id, percent });
    }
}
