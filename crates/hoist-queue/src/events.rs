use std::time::Duration;

use hoist_core::{ItemId, ItemStatus};

/// Notifications broadcast by the queue. Events for one item are sent while
/// the state lock is held, so they arrive in transition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Added {
        id: ItemId,
    },
    StatusChanged {
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },
    Progress {
        id: ItemId,
        percent: u8,
    },
    RetryScheduled {
        id: ItemId,
        retry: u32,
        delay: Duration,
    },
    Swept {
        removed: usize,
    },
    Reconciled {
        verified: usize,
        mismatched: usize,
    },
}

impl QueueEvent {
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Self::Added { id }
            | Self::StatusChanged { id, .. }
            | Self::Progress { id, .. }
            | Self::RetryScheduled { id, .. } => Some(*id),
            Self::Swept { .. } | Self::Reconciled { .. } => None,
        }
    }
}
