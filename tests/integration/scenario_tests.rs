use std::sync::Arc;
use std::time::Duration;

use hoist_core::{fingerprint, ItemId, ItemStatus, Payload, UploadMetadata};
use hoist_queue::local::LocalBackend;
use hoist_queue::memory::MemoryRemote;
use hoist_queue::{ErrorKind, QueueConfig, QueueEvent, UploadQueue};
use hoist_store::LocalStore;
use tokio::sync::broadcast;

fn memory_queue(remote: &MemoryRemote, config: QueueConfig) -> UploadQueue {
    let remote = Arc::new(remote.clone());
    UploadQueue::new(config, remote.clone(), remote).unwrap()
}

fn files(names: &[&str]) -> Vec<Payload> {
    names
        .iter()
        .map(|name| Payload::new(*name, format!("contents of {name}").into_bytes()))
        .collect()
}

fn album(_: &Payload, _: usize) -> UploadMetadata {
    UploadMetadata::new("album")
}

async fn wait_for_status(
    events: &mut broadcast::Receiver<QueueEvent>,
    id: ItemId,
    status: ItemStatus,
) {
    loop {
        if let QueueEvent::StatusChanged { id: of, to, .. } = events.recv().await.unwrap() {
            if of == id && to == status {
                return;
            }
        }
    }
}

/// Replays status events and returns the largest number of items that were
/// `uploading` at the same time.
fn peak_uploading(events: &mut broadcast::Receiver<QueueEvent>) -> usize {
    let mut current = 0usize;
    let mut peak = 0usize;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::StatusChanged { from, to, .. } = event {
            if to == ItemStatus::Uploading {
                current += 1;
                peak = peak.max(current);
            } else if from == ItemStatus::Uploading {
                current -= 1;
            }
        }
    }
    peak
}

// === Test 1: five files, K=3, one transient failure ===
#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_within_bound() {
    let remote = MemoryRemote::new();
    remote.hold();
    remote.fail_next("f3", 1);
    let config = QueueConfig {
        concurrency: 3,
        max_retries: 2,
        ..QueueConfig::default()
    };
    let queue = memory_queue(&remote, config);
    let mut events = queue.subscribe();

    let ids = queue.submit(files(&["f1", "f2", "f3", "f4", "f5"]), album);
    remote.wait_held(3).await;

    let uploading: Vec<ItemId> = queue
        .list()
        .into_iter()
        .filter(|s| s.status == ItemStatus::Uploading)
        .map(|s| s.id)
        .collect();
    assert_eq!(uploading, ids[..3].to_vec());

    remote.release();
    queue.wait_idle().await;

    for snapshot in queue.list() {
        assert_eq!(snapshot.status, ItemStatus::Uploaded, "{}", snapshot.name);
        assert!(snapshot.retry_count <= 2);
    }
    assert_eq!(queue.get(ids[2]).unwrap().retry_count, 1);

    let log = remote.attempt_log();
    assert_eq!(&log[..3], &["f1", "f2", "f3"]);
    assert_eq!(log.last().map(String::as_str), Some("f3"));
    assert_eq!(remote.uploads_of("f3"), 2);
    assert_eq!(log.len(), 6);

    assert!(peak_uploading(&mut events) <= 3);
    assert!(remote.peak_in_flight() <= 3);
}

// === Test 2: retried items go to the back of the queue ===
#[tokio::test(start_paused = true)]
async fn test_retry_requeues_behind_waiting_items() {
    let remote = MemoryRemote::new();
    remote.hold();
    remote.fail_next("a", 1);
    let config = QueueConfig {
        concurrency: 1,
        ..QueueConfig::default()
    };
    let queue = memory_queue(&remote, config);
    let mut events = queue.subscribe();

    let ids = queue.submit(files(&["a", "b", "c"]), album);
    wait_for_status(&mut events, ids[2], ItemStatus::Queued).await;
    remote.release();
    queue.wait_idle().await;

    assert_eq!(remote.attempt_log(), vec!["a", "b", "c", "a"]);
    assert_eq!(queue.get(ids[0]).unwrap().status, ItemStatus::Uploaded);
}

// === Test 3: duplicate detection, then force upload ===
#[tokio::test(start_paused = true)]
async fn test_duplicate_never_occupies_a_slot() {
    let remote = MemoryRemote::new();
    let batch = files(&["a", "b"]);
    remote.seed("album", batch[1].bytes());
    let queue = memory_queue(&remote, QueueConfig::default());
    let mut events = queue.subscribe();

    let ids = queue.submit(batch, album);
    queue.wait_idle().await;

    assert_eq!(queue.get(ids[0]).unwrap().status, ItemStatus::Uploaded);
    let b = queue.get(ids[1]).unwrap();
    assert_eq!(b.status, ItemStatus::Duplicate);
    assert!(b.duplicate_of.is_some());
    assert_eq!(remote.uploads_of("b"), 0);
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::StatusChanged { id, to, .. } = event {
            assert!(!(id == ids[1] && to == ItemStatus::Uploading));
        }
    }

    queue.force_upload(ids[1]).unwrap();
    queue.wait_idle().await;
    let b = queue.get(ids[1]).unwrap();
    assert_eq!(b.status, ItemStatus::Uploaded);
    assert!(b.duplicate_of.is_none());
    assert_eq!(remote.uploads_of("b"), 1);
}

// === Test 4: cancel mid-transfer at 40% ===
#[tokio::test(start_paused = true)]
async fn test_cancel_mid_transfer_freezes_progress() {
    let remote = MemoryRemote::new();
    remote.hold_at(40);
    let queue = memory_queue(&remote, QueueConfig::default());
    let mut events = queue.subscribe();

    let id = queue.submit(files(&["a"]), album)[0];
    remote.wait_held(1).await;
    assert_eq!(queue.get(id).unwrap().progress, 40);

    queue.cancel(id).unwrap();
    wait_for_status(&mut events, id, ItemStatus::Cancelled).await;
    queue.wait_idle().await;

    let item = queue.get(id).unwrap();
    assert_eq!(item.status, ItemStatus::Cancelled);
    assert_eq!(item.progress, 40);
    assert!(item.last_error.is_none());
    let stats = queue.stats();
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.cancelled, 1);
    assert!(stats.error_message.is_none());
    assert_eq!(remote.object_count(), 0);
}

// === Test 5: cancel is idempotent ===
#[tokio::test(start_paused = true)]
async fn test_cancel_twice_and_after_terminal() {
    let remote = MemoryRemote::new();
    remote.hold();
    let queue = memory_queue(&remote, QueueConfig::default());

    let ids = queue.submit(files(&["a", "b"]), album);
    queue.cancel(ids[0]).unwrap();
    queue.cancel(ids[0]).unwrap();
    assert_eq!(queue.get(ids[0]).unwrap().status, ItemStatus::Cancelled);

    remote.release();
    queue.wait_idle().await;
    let mut events = queue.subscribe();
    queue.cancel(ids[0]).unwrap();
    queue.cancel(ids[1]).unwrap();
    assert_eq!(queue.get(ids[1]).unwrap().status, ItemStatus::Uploaded);
    assert!(events.try_recv().is_err());
}

// === Test 6: the queue drains and is swept ===
#[tokio::test(start_paused = true)]
async fn test_drain_and_sweep() {
    let remote = MemoryRemote::new();
    remote.fail_next("bad", 10);
    let config = QueueConfig {
        max_retries: 1,
        ..QueueConfig::default()
    };
    let queue = memory_queue(&remote, config);

    queue.submit(files(&["a", "b", "bad"]), album);
    queue.wait_idle().await;
    let stats = queue.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = queue.stats();
    assert_eq!(stats.total, 0);
    let last = stats.last_batch.unwrap();
    assert_eq!((last.total, last.completed, last.failed), (3, 2, 1));
}

// === Test 7: reconciliation against the local store ===
#[tokio::test(start_paused = true)]
async fn test_reconcile_with_local_store() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(LocalBackend::new(LocalStore::init(dir.path()).unwrap()));
    let queue = UploadQueue::new(QueueConfig::default(), backend.clone(), backend.clone()).unwrap();

    let batch = files(&["a", "b", "c"]);
    let removed = fingerprint(batch[1].bytes());
    let ids = queue.submit(batch, album);
    queue.wait_idle().await;
    assert_eq!(backend.store().list(Some("album")).unwrap().len(), 3);

    assert!(backend.store().remove_object("album", &removed).unwrap());
    let report = queue.reconcile().await;
    assert_eq!(report.verified, 2);
    assert_eq!(report.mismatched, vec![ids[1]]);
    let b = queue.get(ids[1]).unwrap();
    assert_eq!(b.status, ItemStatus::Error);
    assert_eq!(b.last_error.unwrap().kind, ErrorKind::Reconciliation);

    queue.retry(ids[1]).unwrap();
    queue.wait_idle().await;
    assert_eq!(queue.get(ids[1]).unwrap().status, ItemStatus::Uploaded);
    assert!(backend.store().has_object("album", &removed));
}

// === Test 8: local store dedups across batches ===
#[tokio::test(start_paused = true)]
async fn test_local_store_dedups_second_batch() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(LocalBackend::new(LocalStore::init(dir.path()).unwrap()));
    let queue = UploadQueue::new(QueueConfig::default(), backend.clone(), backend.clone()).unwrap();

    let first = queue.submit(files(&["a", "b"]), album);
    queue.wait_idle().await;
    assert!(first
        .iter()
        .all(|id| queue.get(*id).unwrap().status == ItemStatus::Uploaded));

    let second = queue.submit(files(&["a", "c"]), album);
    queue.wait_idle().await;
    assert_eq!(queue.get(second[0]).unwrap().status, ItemStatus::Duplicate);
    assert_eq!(queue.get(second[1]).unwrap().status, ItemStatus::Uploaded);

    let other_scope = queue.submit(files(&["a"]), |_, _| UploadMetadata::new("other"))[0];
    queue.wait_idle().await;
    assert_eq!(queue.get(other_scope).unwrap().status, ItemStatus::Uploaded);
}

// === Test 9: invalid metadata is a validation error ===
#[tokio::test(start_paused = true)]
async fn test_invalid_path_hint_is_rejected() {
    let remote = MemoryRemote::new();
    let queue = memory_queue(&remote, QueueConfig::default());

    let id = queue.submit(files(&["a"]), |_, _| {
        UploadMetadata::new("album").with_path_hint("../escape.jpg")
    })[0];
    queue.wait_idle().await;

    let item = queue.get(id).unwrap();
    assert_eq!(item.status, ItemStatus::Error);
    assert_eq!(item.last_error.unwrap().kind, ErrorKind::Validation);
    assert!(item.fingerprint.is_none());
    assert_eq!(remote.upload_count(), 0);
}

// === Test 10: identical payloads hash identically ===
#[tokio::test(start_paused = true)]
async fn test_identical_payloads_share_a_fingerprint() {
    let remote = MemoryRemote::new();
    remote.hold();
    let queue = memory_queue(&remote, QueueConfig::default());

    let same = Payload::new("x", b"same bytes".to_vec());
    let copy = Payload::new("y", b"same bytes".to_vec());
    let ids = queue.submit(vec![same, copy], album);
    remote.wait_held(2).await;

    let x = queue.get(ids[0]).unwrap().fingerprint.unwrap();
    let y = queue.get(ids[1]).unwrap().fingerprint.unwrap();
    assert_eq!(x, y);
    assert_eq!(x, fingerprint(b"same bytes"));
    remote.release();
    queue.wait_idle().await;
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn run_batch(concurrency: usize, failures: Vec<u32>, max_retries: u32) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async move {
            let remote = MemoryRemote::new();
            let names: Vec<String> = (0..failures.len()).map(|i| format!("p{i}")).collect();
            for (name, times) in names.iter().zip(&failures) {
                remote.fail_next(name, *times);
            }
            let config = QueueConfig {
                concurrency,
                max_retries,
                event_capacity: 8192,
                ..QueueConfig::default()
            };
            let queue = memory_queue(&remote, config);
            let mut events = queue.subscribe();

            let payloads = names
                .iter()
                .map(|n| Payload::new(n.clone(), n.as_bytes().to_vec()))
                .collect();
            queue.submit(payloads, album);
            queue.wait_idle().await;

            assert!(peak_uploading(&mut events) <= concurrency);
            assert!(remote.peak_in_flight() <= concurrency);
            for (snapshot, times) in queue.list().iter().zip(&failures) {
                assert!(snapshot.retry_count <= max_retries);
                if *times <= max_retries {
                    assert_eq!(snapshot.status, ItemStatus::Uploaded);
                } else {
                    assert_eq!(snapshot.status, ItemStatus::Error);
                    assert!(snapshot.retries_exhausted);
                }
            }
        });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn concurrency_and_retry_bounds_hold(
            concurrency in 1usize..4,
            failures in proptest::collection::vec(0u32..4, 1..8),
            max_retries in 0u32..3,
        ) {
            run_batch(concurrency, failures, max_retries);
        }
    }
}
