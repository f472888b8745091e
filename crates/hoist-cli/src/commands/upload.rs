use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use hoist_core::{ItemId, ItemStatus, Payload, UploadMetadata};
use hoist_queue::local::LocalBackend;
use hoist_queue::stats::error_summary;
use hoist_queue::{
    BatchTotals, QueueEvent, QueueStats, ReconcileReport, SubmitOptions, UploadQueue,
};
use tokio::sync::broadcast::error::RecvError;

use crate::config::{load_queue_config, open_store, store_root, QueueFlags};
use crate::filter::{collect_files, IncludeRules};
use crate::output;

#[derive(Args)]
pub struct UploadArgs {
    /// Files or directories to upload
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Scope (album, folder) to upload into
    #[arg(short, long, default_value = "default")]
    scope: String,
    /// Upload even when the store already holds identical content
    #[arg(long)]
    force: bool,
    /// Only upload files under directories that match these globs
    #[arg(long)]
    include: Vec<String>,
    /// Re-check every uploaded object against the store afterwards
    #[arg(long)]
    verify: bool,
    #[command(flatten)]
    queue: QueueFlags,
}

pub async fn run(args: UploadArgs, store: Option<&Path>) -> anyhow::Result<()> {
    let root = store_root(store)?;
    let local = open_store(Some(&root))?;
    let config = load_queue_config(&root, &args.queue)?;
    let rules = IncludeRules::new(&args.include)?;

    let files = collect_files(&args.paths, &rules)?;
    if files.is_empty() {
        println!("nothing to upload");
        return Ok(());
    }
    let mut payloads = Vec::with_capacity(files.len());
    for file in &files {
        let data = std::fs::read(&file.path)
            .with_context(|| format!("reading {}", file.path.display()))?;
        payloads.push(Payload::new(file.name.clone(), data));
    }

    let backend = Arc::new(LocalBackend::new(local));
    let queue = UploadQueue::new(config, backend.clone(), backend)?;
    let mut events = queue.subscribe();

    let scope = args.scope.clone();
    let ids = queue.submit_with(
        payloads,
        |payload, _| UploadMetadata::new(scope.clone()).with_path_hint(payload.name()),
        SubmitOptions {
            force_upload: args.force,
        },
    );
    let mut reporter = Reporter::new(&queue);

    let idle = queue.wait_idle();
    tokio::pin!(idle);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = &mut idle => break,
            event = events.recv() => match event {
                Ok(event) => reporter.show(&queue, &event),
                Err(RecvError::Lagged(n)) => tracing::warn!("skipped {n} queue events"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                eprintln!("interrupted, cancelling remaining uploads");
                for id in &ids {
                    queue.cancel(*id)?;
                }
            }
        }
    }
    while let Ok(event) = events.try_recv() {
        reporter.show(&queue, &event);
    }

    // The sweep may clear the set while a slow verification runs.
    let stats = queue.stats();
    let report = if args.verify {
        let report = queue.reconcile().await;
        println!(
            "verified {} objects, {} missing, {} unverifiable",
            report.verified,
            report.mismatched.len(),
            report.unverifiable
        );
        Some(report)
    } else {
        None
    };

    println!("{}", output::header("Summary"));
    let totals = batch_totals(&stats);
    println!("{}", output::kv("uploaded", &totals.completed.to_string()));
    println!("{}", output::kv("duplicate", &totals.duplicate.to_string()));
    println!("{}", output::kv("cancelled", &totals.cancelled.to_string()));
    println!("{}", output::kv("failed", &totals.failed.to_string()));
    for failed in &stats.errors {
        println!("  {}: {}", failed.name, failed.error);
    }

    verdict(&stats, report.as_ref(), interrupted)
}

fn batch_totals(stats: &QueueStats) -> BatchTotals {
    match stats.last_batch {
        Some(last) if stats.total == 0 => last,
        _ => BatchTotals::from(stats),
    }
}

fn verdict(
    stats: &QueueStats,
    report: Option<&ReconcileReport>,
    interrupted: bool,
) -> anyhow::Result<()> {
    if let Some(message) = error_summary(batch_totals(stats).failed) {
        anyhow::bail!(message);
    }
    if let Some(report) = report {
        if !report.mismatched.is_empty() {
            anyhow::bail!(
                "{} uploaded objects missing from the store",
                report.mismatched.len()
            );
        }
    }
    if interrupted {
        anyhow::bail!("upload interrupted");
    }
    Ok(())
}

struct Reporter {
    names: HashMap<ItemId, String>,
    shown_quarter: HashMap<ItemId, u8>,
}

impl Reporter {
    fn new(queue: &UploadQueue) -> Self {
        Self {
            names: queue.list().into_iter().map(|s| (s.id, s.name)).collect(),
            shown_quarter: HashMap::new(),
        }
    }

    fn name(&self, id: &ItemId) -> &str {
        self.names.get(id).map(String::as_str).unwrap_or("?")
    }

    fn show(&mut self, queue: &UploadQueue, event: &QueueEvent) {
        match event {
            QueueEvent::StatusChanged { id, to, .. } => {
                if *to == ItemStatus::Uploading {
                    self.shown_quarter.insert(*id, 0);
                }
                let snapshot = queue.get(*id);
                let detail = match (to, &snapshot) {
                    (ItemStatus::Error, Some(s)) => s.last_error.as_ref().map(|e| e.to_string()),
                    (ItemStatus::Duplicate, Some(s)) => s
                        .duplicate_of
                        .as_ref()
                        .map(|o| format!("already stored as {}", o.fingerprint)),
                    (ItemStatus::Uploaded, Some(s)) => s.stored.as_ref().map(|o| o.key.clone()),
                    _ => None,
                };
                // Preparing and queued are too chatty for a terminal.
                if !matches!(to, ItemStatus::Preparing | ItemStatus::Queued) {
                    println!("{}", output::status_line(*to, self.name(id), detail.as_deref()));
                }
            }
            QueueEvent::Progress { id, percent } => {
                let quarter = percent / 25;
                let name = self.names.get(id).map(String::as_str).unwrap_or("?");
                let shown = self.shown_quarter.entry(*id).or_insert(0);
                if quarter > *shown && *percent < 100 {
                    *shown = quarter;
                    println!("{:<12} {name} {percent}%", "");
                }
            }
            QueueEvent::RetryScheduled { id, retry, delay } => {
                println!(
                    "{}",
                    output::status_line(
                        ItemStatus::Error,
                        self.name(id),
                        Some(&format!("retry {retry} in {delay:?}")),
                    )
                );
            }
            QueueEvent::Added { .. } | QueueEvent::Swept { .. } | QueueEvent::Reconciled { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swept_with_failure() -> QueueStats {
        QueueStats {
            last_batch: Some(BatchTotals {
                total: 3,
                completed: 2,
                failed: 1,
                ..BatchTotals::default()
            }),
            ..QueueStats::default()
        }
    }

    #[test]
    fn swept_batch_still_reports_failures() {
        let stats = swept_with_failure();
        assert_eq!(batch_totals(&stats).completed, 2);
        let err = verdict(&stats, None, false).unwrap_err();
        assert_eq!(err.to_string(), "1 upload failed");
    }

    #[test]
    fn live_stats_win_over_last_batch() {
        let stats = QueueStats {
            total: 1,
            completed: 1,
            ..swept_with_failure()
        };
        assert_eq!(batch_totals(&stats).failed, 0);
        assert!(verdict(&stats, None, false).is_ok());
    }

    #[test]
    fn missing_objects_fail_the_upload() {
        let stats = QueueStats {
            total: 1,
            completed: 1,
            ..QueueStats::default()
        };
        let report = ReconcileReport {
            verified: 0,
            mismatched: vec![hoist_core::ItemId::new()],
            unverifiable: 0,
        };
        assert!(verdict(&stats, Some(&report), false).is_err());
        assert!(verdict(&stats, None, true).is_err());
    }
}
