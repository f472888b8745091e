use std::time::Duration;

use hoist_core::{ItemId, ItemStatus};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::ItemError;
use crate::retry::RetryPolicy;
use crate::state::QueueState;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub completed: usize,
    pub uploading: usize,
    pub pending: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub duplicate: usize,
    pub overall_progress: f64,
    /// The uploading item that has gone longest without progress, if that is
    /// longer than the stall threshold. Advisory only.
    pub stuck: Option<StuckItem>,
    pub errors: Vec<FailedItem>,
    pub error_message: Option<String>,
    /// Totals of the previous batch, captured right before it was swept.
    pub last_batch: Option<BatchTotals>,
}

impl QueueStats {
    pub fn is_stuck(&self) -> bool {
        self.stuck.is_some()
    }

    pub fn has_errors(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StuckItem {
    pub id: ItemId,
    pub name: String,
    pub progress: u8,
    pub stalled_for: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub id: ItemId,
    pub name: String,
    pub error: ItemError,
    pub retry_count: u32,
    pub retries_exhausted: bool,
    pub retry_pending: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub duplicate: usize,
}

impl From<&QueueStats> for BatchTotals {
    fn from(stats: &QueueStats) -> Self {
        Self {
            total: stats.total,
            completed: stats.completed,
            failed: stats.failed,
            cancelled: stats.cancelled,
            duplicate: stats.duplicate,
        }
    }
}

pub fn error_summary(failed: usize) -> Option<String> {
    match failed {
        0 => None,
        1 => Some("1 upload failed".to_string()),
        n => Some(format!("{n} uploads failed")),
    }
}

pub(crate) fn compute(
    state: &QueueState,
    policy: &RetryPolicy,
    now: Instant,
    stall_threshold: Duration,
) -> QueueStats {
    let mut stats = QueueStats {
        last_batch: state.last_batch,
        ..QueueStats::default()
    };

    for item in state.ordered() {
        stats.total += 1;
        match item.status {
            ItemStatus::Preparing | ItemStatus::Queued => stats.pending += 1,
            ItemStatus::Uploading => {
                stats.uploading += 1;
                let stalled_for = now.saturating_duration_since(item.last_progress_at);
                let longer = stats
                    .stuck
                    .as_ref()
                    .map_or(true, |s| stalled_for > s.stalled_for);
                if stalled_for > stall_threshold && longer {
                    stats.stuck = Some(StuckItem {
                        id: item.id,
                        name: item.payload.name().to_string(),
                        progress: item.progress,
                        stalled_for,
                    });
                }
            }
            ItemStatus::Uploaded => stats.completed += 1,
            ItemStatus::Error => {
                stats.failed += 1;
                if let Some(error) = &item.last_error {
                    stats.errors.push(FailedItem {
                        id: item.id,
                        name: item.payload.name().to_string(),
                        error: error.clone(),
                        retry_count: item.retry_count,
                        retries_exhausted: policy.is_exhausted(item.retry_count),
                        retry_pending: item.retry_pending,
                    });
                }
            }
            ItemStatus::Duplicate => stats.duplicate += 1,
            ItemStatus::Cancelled => stats.cancelled += 1,
        }
    }

    if stats.total > 0 {
        stats.overall_progress = stats.completed as f64 / stats.total as f64;
    }
    stats.error_message = error_summary(stats.failed);
    stats
}
