use std::sync::Arc;

use hoist_core::ItemId;

use crate::events::QueueEvent;
use crate::queue::Shared;
use crate::stats::{self, BatchTotals};

impl Shared {
    /// Clear terminal items once the queue has stayed settled for the
    /// cleanup grace period. Any admission, retry or re-upload in the
    /// meantime bumps the generation and turns this sweep into a no-op.
    pub(crate) fn schedule_sweep(self: &Arc<Self>, generation: u64) {
        let shared = Arc::clone(self);
        let grace = self.config.cleanup_grace();
        self.runtime.spawn(async move {
            shared.clock.sleep(grace).await;
            shared.sweep(generation);
        });
    }

    fn sweep(&self, generation: u64) {
        let removed = {
            let mut state = self.state.lock();
            if state.sweep_scheduled_for == Some(generation) {
                state.sweep_scheduled_for = None;
            }
            if state.generation != generation || !state.is_settled() || state.items.is_empty() {
                tracing::debug!("sweep for generation {generation} superseded");
                return;
            }
            // Duplicates and retryable errors stay until the caller decides.
            let terminal: Vec<ItemId> = state
                .ordered()
                .filter(|item| item.is_terminal(&self.policy))
                .map(|item| item.id)
                .collect();
            if terminal.is_empty() {
                return;
            }
            let now = self.clock.now();
            let totals = stats::compute(&state, &self.policy, now, self.config.stall_threshold());
            state.last_batch = Some(BatchTotals::from(&totals));
            for id in &terminal {
                state.remove(id);
            }
            let removed = terminal.len();
            state.emit(QueueEvent::Swept { removed });
            removed
        };
        tracing::debug!("swept {removed} terminal items");
        self.settled.notify_waiters();
    }
}
