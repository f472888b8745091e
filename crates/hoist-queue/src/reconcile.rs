use std::sync::Arc;

use hoist_core::{Fingerprint, ItemId, ItemStatus};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::error::ItemError;
use crate::events::QueueEvent;
use crate::queue::Shared;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub verified: usize,
    /// Missing remotely; these items are now in `error`.
    pub mismatched: Vec<ItemId>,
    /// The lookup itself failed; the item was left as it was.
    pub unverifiable: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.unverifiable == 0
    }
}

struct Check {
    index: usize,
    id: ItemId,
    attempt: u32,
    scope: String,
    fingerprint: Fingerprint,
}

enum Verdict {
    Present,
    Missing,
    Unknown,
}

impl Shared {
    pub(crate) async fn reconcile(self: &Arc<Self>) -> ReconcileReport {
        let checks: Vec<Check> = {
            let state = self.state.lock();
            state
                .ordered()
                .filter(|item| item.status == ItemStatus::Uploaded)
                .enumerate()
                .filter_map(|(index, item)| {
                    Some(Check {
                        index,
                        id: item.id,
                        attempt: item.attempt,
                        scope: item.metadata.scope.clone(),
                        fingerprint: item.fingerprint?,
                    })
                })
                .collect()
        };

        let mut lookups = JoinSet::new();
        for check in checks {
            let shared = Arc::clone(self);
            lookups.spawn_on(
                async move {
                    let verdict = match shared
                        .inventory
                        .find_by_hash(&check.scope, &check.fingerprint)
                        .await
                    {
                        Ok(Some(_)) => Verdict::Present,
                        Ok(None) => Verdict::Missing,
                        Err(e) => {
                            tracing::warn!("could not verify {}: {e}", check.id);
                            Verdict::Unknown
                        }
                    };
                    (check, verdict)
                },
                &self.runtime,
            );
        }

        let mut results = Vec::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!("verification task failed: {e}"),
            }
        }

        results.sort_by_key(|(check, _)| check.index);

        let mut report = ReconcileReport::default();
        {
            let mut state = self.state.lock();
            for (check, verdict) in results {
                let Some(item) = state.items.get_mut(&check.id) else {
                    continue;
                };
                // Swept, re-uploaded or otherwise moved on while we looked.
                if item.status != ItemStatus::Uploaded || item.attempt != check.attempt {
                    continue;
                }
                match verdict {
                    Verdict::Present => report.verified += 1,
                    Verdict::Unknown => report.unverifiable += 1,
                    Verdict::Missing => {
                        tracing::warn!(
                            "{} ({}) is missing remotely",
                            check.id,
                            item.payload.name()
                        );
                        item.progress = 0;
                        item.stored = None;
                        item.last_error = Some(ItemError::reconciliation(format!(
                            "object {} not found in scope {}",
                            check.fingerprint, check.scope
                        )));
                        state.set_status(check.id, ItemStatus::Error);
                        report.mismatched.push(check.id);
                    }
                }
            }
            state.emit(QueueEvent::Reconciled {
                verified: report.verified,
                mismatched: report.mismatched.len(),
            });
        }
        tracing::debug!(
            "reconciled: {} verified, {} mismatched, {} unverifiable",
            report.verified,
            report.mismatched.len(),
            report.unverifiable
        );
        self.after_change();
        report
    }
}
