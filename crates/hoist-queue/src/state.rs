use std::collections::{HashMap, HashSet, VecDeque};

use hoist_core::{ItemId, ItemStatus};
use tokio::sync::broadcast;

use crate::events::QueueEvent;
use crate::item::Item;
use crate::stats::BatchTotals;

/// Everything the queue mutates. Lives behind a single mutex in the queue.
pub(crate) struct QueueState {
    pub items: HashMap<ItemId, Item>,
    pub order: Vec<ItemId>,
    pub pending: VecDeque<ItemId>,
    pub processing: HashSet<ItemId>,
    /// Bumped whenever an item (re)enters the pipeline; a sweep only runs if
    /// the generation it was scheduled for is still current.
    pub generation: u64,
    pub sweep_scheduled_for: Option<u64>,
    pub last_batch: Option<BatchTotals>,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueState {
    pub fn new(events: broadcast::Sender<QueueEvent>) -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            pending: VecDeque::new(),
            processing: HashSet::new(),
            generation: 0,
            sweep_scheduled_for: None,
            last_batch: None,
            events,
        }
    }

    pub fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn insert(&mut self, item: Item) {
        let id = item.id;
        self.items.insert(id, item);
        self.order.push(id);
        self.generation += 1;
        self.emit(QueueEvent::Added { id });
    }

    /// Apply a lifecycle transition and broadcast it. Returns `false` (and
    /// changes nothing) for an edge the lifecycle does not allow.
    pub fn set_status(&mut self, id: ItemId, to: ItemStatus) -> bool {
        let Some(item) = self.items.get_mut(&id) else {
            return false;
        };
        let from = item.status;
        if !from.can_transition_to(to) {
            tracing::error!("rejected transition for {id}: {from} -> {to}");
            return false;
        }
        item.status = to;
        if to.is_active() {
            self.generation += 1;
        }
        self.emit(QueueEvent::StatusChanged { id, from, to });
        true
    }

    pub fn requeue(&mut self, id: ItemId) -> bool {
        let Some(item) = self.items.get_mut(&id) else {
            return false;
        };
        let from = item.status;
        if !from.can_transition_to(ItemStatus::Queued) {
            return false;
        }
        if from == ItemStatus::Error {
            item.retry_count += 1;
        }
        item.retry_pending = false;
        item.progress = 0;
        item.last_error = None;
        item.duplicate_of = None;
        if !self.set_status(id, ItemStatus::Queued) {
            return false;
        }
        self.pending.push_back(id);
        true
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<Item> {
        let item = self.items.remove(id)?;
        self.order.retain(|o| o != id);
        self.pending.retain(|p| p != id);
        Some(item)
    }

    pub fn is_settled(&self) -> bool {
        self.items.values().all(Item::is_settled)
    }

    pub fn ordered(&self) -> impl Iterator<Item = &Item> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }
}
