use std::sync::Arc;

use hoist_core::{ItemId, ItemStatus, Payload, UploadMetadata};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};

use crate::clock::{Clock, TokioClock};
use crate::config::QueueConfig;
use crate::events::QueueEvent;
use crate::item::{now_ms, ItemSnapshot};
use crate::reconcile::ReconcileReport;
use crate::retry::RetryPolicy;
use crate::state::QueueState;
use crate::stats::{self, QueueStats};
use crate::transport::{Inventory, Transport};
use crate::QueueError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub force_upload: bool,
}

pub(crate) struct Shared {
    pub config: QueueConfig,
    pub policy: RetryPolicy,
    pub transport: Arc<dyn Transport>,
    pub inventory: Arc<dyn Inventory>,
    pub clock: Arc<dyn Clock>,
    pub state: Mutex<QueueState>,
    pub events: broadcast::Sender<QueueEvent>,
    pub settled: Notify,
    pub runtime: Handle,
}

impl Shared {
    /// Bookkeeping after any change that may have let the queue settle:
    /// wake `wait_idle` callers and arm the cleanup sweep.
    pub fn after_change(self: &Arc<Self>) {
        let sweep_generation = {
            let mut state = self.state.lock();
            if !state.is_settled() {
                return;
            }
            if state.items.is_empty() || state.sweep_scheduled_for == Some(state.generation) {
                None
            } else {
                state.sweep_scheduled_for = Some(state.generation);
                Some(state.generation)
            }
        };
        self.settled.notify_waiters();
        if let Some(generation) = sweep_generation {
            self.schedule_sweep(generation);
        }
    }
}

pub struct UploadQueueBuilder {
    config: QueueConfig,
    transport: Arc<dyn Transport>,
    inventory: Arc<dyn Inventory>,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
}

impl UploadQueueBuilder {
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runtime that drives hashing, transfers and timers. Defaults to the
    /// runtime current at [`build`](Self::build).
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<UploadQueue, QueueError> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| QueueError::NoRuntime)?,
        };
        let (events, _) = broadcast::channel(self.config.event_capacity);
        let shared = Shared {
            policy: RetryPolicy::from_config(&self.config),
            config: self.config,
            transport: self.transport,
            inventory: self.inventory,
            clock: self.clock,
            state: Mutex::new(QueueState::new(events.clone())),
            events,
            settled: Notify::new(),
            runtime,
        };
        Ok(UploadQueue {
            shared: Arc::new(shared),
        })
    }
}

/// Handle to an upload orchestrator. Cheap to clone; all clones drive the
/// same set of items.
#[derive(Clone)]
pub struct UploadQueue {
    shared: Arc<Shared>,
}

impl UploadQueue {
    pub fn builder(
        transport: Arc<dyn Transport>,
        inventory: Arc<dyn Inventory>,
    ) -> UploadQueueBuilder {
        UploadQueueBuilder {
            config: QueueConfig::default(),
            transport,
            inventory,
            clock: Arc::new(TokioClock),
            runtime: None,
        }
    }

    pub fn new(
        config: QueueConfig,
        transport: Arc<dyn Transport>,
        inventory: Arc<dyn Inventory>,
    ) -> Result<Self, QueueError> {
        Self::builder(transport, inventory).config(config).build()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.shared.policy
    }

    /// Admit a batch. Every payload becomes a `preparing` item before this
    /// returns; hashing, the duplicate precheck and uploads happen in the
    /// background.
    pub fn submit<F>(&self, payloads: Vec<Payload>, metadata: F) -> Vec<ItemId>
    where
        F: FnMut(&Payload, usize) -> UploadMetadata,
    {
        self.submit_with(payloads, metadata, SubmitOptions::default())
    }

    pub fn submit_with<F>(
        &self,
        payloads: Vec<Payload>,
        metadata: F,
        options: SubmitOptions,
    ) -> Vec<ItemId>
    where
        F: FnMut(&Payload, usize) -> UploadMetadata,
    {
        self.shared.admit(payloads, metadata, options)
    }

    /// Re-queue a failed item. A no-op unless the item is in `error` with
    /// retries left.
    pub fn retry(&self, id: ItemId) -> Result<(), QueueError> {
        {
            let mut state = self.shared.state.lock();
            let item = state.items.get(&id).ok_or(QueueError::UnknownItem(id))?;
            if item.status != ItemStatus::Error {
                tracing::debug!("retry ignored for {id}: status is {}", item.status);
                return Ok(());
            }
            if self.shared.policy.is_exhausted(item.retry_count) {
                tracing::debug!("retry ignored for {id}: retries exhausted");
                return Ok(());
            }
            if item.fingerprint.is_none() {
                tracing::debug!("retry ignored for {id}: failed before hashing");
                return Ok(());
            }
            state.requeue(id);
        }
        self.shared.pump();
        Ok(())
    }

    /// Cancel an item that has not reached a terminal state, including an
    /// `error` that could still be retried. Idempotent.
    pub fn cancel(&self, id: ItemId) -> Result<(), QueueError> {
        {
            let mut state = self.shared.state.lock();
            let item = state.items.get_mut(&id).ok_or(QueueError::UnknownItem(id))?;
            match item.status {
                ItemStatus::Preparing | ItemStatus::Queued => {
                    item.cancel.cancel();
                    item.ended_at_ms = Some(now_ms());
                    state.pending.retain(|p| *p != id);
                    state.set_status(id, ItemStatus::Cancelled);
                }
                ItemStatus::Uploading => {
                    // The slot is released when the transport returns.
                    if !item.cancel_requested {
                        item.cancel_requested = true;
                        item.cancel.cancel();
                        tracing::debug!("cancellation requested for uploading item {id}");
                    }
                }
                ItemStatus::Error if !item.is_terminal(&self.shared.policy) => {
                    item.retry_pending = false;
                    item.last_error = None;
                    item.cancel.cancel();
                    state.set_status(id, ItemStatus::Cancelled);
                }
                _ => return Ok(()),
            }
        }
        self.shared.after_change();
        Ok(())
    }

    pub fn force_upload(&self, id: ItemId) -> Result<(), QueueError> {
        {
            let mut state = self.shared.state.lock();
            let item = state.items.get_mut(&id).ok_or(QueueError::UnknownItem(id))?;
            if item.status != ItemStatus::Duplicate {
                return Ok(());
            }
            item.force_upload = true;
            state.requeue(id);
        }
        self.shared.pump();
        Ok(())
    }

    pub fn remove(&self, id: ItemId) -> Result<(), QueueError> {
        {
            let mut state = self.shared.state.lock();
            let item = state.items.get(&id).ok_or(QueueError::UnknownItem(id))?;
            if !item.is_settled() {
                tracing::debug!("remove ignored for {id}: status is {}", item.status);
                return Ok(());
            }
            state.remove(&id);
        }
        self.shared.after_change();
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        stats::compute(
            &state,
            &self.shared.policy,
            now,
            self.shared.config.stall_threshold(),
        )
    }

    pub fn list(&self) -> Vec<ItemSnapshot> {
        let state = self.shared.state.lock();
        state
            .ordered()
            .map(|item| item.snapshot(&self.shared.policy))
            .collect()
    }

    pub fn get(&self, id: ItemId) -> Option<ItemSnapshot> {
        let state = self.shared.state.lock();
        state
            .items
            .get(&id)
            .map(|item| item.snapshot(&self.shared.policy))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }

    /// Resolves once nothing is preparing, queued, uploading or waiting on
    /// an automatic retry.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.state.lock().is_settled() {
                return;
            }
            notified.await;
        }
    }

    pub async fn reconcile(&self) -> ReconcileReport {
        self.shared.reconcile().await
    }
}
