use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hoist_core::{fingerprint, Fingerprint, MediaKind, StoredObject};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::{InventoryError, TransportError};
use crate::transport::{Inventory, Transport, UploadRequest};

struct Settings {
    steps: u8,
    step_delay: Duration,
    hold_at: u8,
    ignore_cancel: bool,
    failures: HashMap<String, u32>,
    rejects: HashSet<String>,
    lookup_failures: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            steps: 10,
            step_delay: Duration::ZERO,
            hold_at: 0,
            ignore_cancel: false,
            failures: HashMap::new(),
            rejects: HashSet::new(),
            lookup_failures: 0,
        }
    }
}

struct Inner {
    objects: Mutex<HashMap<(String, Fingerprint), StoredObject>>,
    settings: Mutex<Settings>,
    attempts: Mutex<Vec<String>>,
    lookups: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    held: AtomicUsize,
    held_changed: Notify,
    gate: watch::Sender<bool>,
}

/// Shared, concurrency-safe remote. Clones see the same objects and
/// settings.
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                objects: Mutex::new(HashMap::new()),
                settings: Mutex::new(Settings::default()),
                attempts: Mutex::new(Vec::new()),
                lookups: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                held: AtomicUsize::new(0),
                held_changed: Notify::new(),
                gate,
            }),
        }
    }

    pub fn seed(&self, scope: &str, data: &[u8]) -> StoredObject {
        let object = stored_object(
            scope,
            fingerprint(data),
            data.len() as u64,
            MediaKind::sniff(data),
        );
        self.inner
            .objects
            .lock()
            .insert((scope.to_string(), object.fingerprint), object.clone());
        object
    }

    pub fn remove(&self, scope: &str, fp: &Fingerprint) -> bool {
        self.inner
            .objects
            .lock()
            .remove(&(scope.to_string(), *fp))
            .is_some()
    }

    pub fn contains(&self, scope: &str, fp: &Fingerprint) -> bool {
        self.inner
            .objects
            .lock()
            .contains_key(&(scope.to_string(), *fp))
    }

    pub fn object_count(&self) -> usize {
        self.inner.objects.lock().len()
    }

    /// Fail the next `times` uploads of the payload called `name` with a
    /// transient error.
    pub fn fail_next(&self, name: &str, times: u32) {
        self.inner
            .settings
            .lock()
            .failures
            .insert(name.to_string(), times);
    }

    pub fn reject(&self, name: &str) {
        self.inner.settings.lock().rejects.insert(name.to_string());
    }

    pub fn fail_lookups(&self, times: u32) {
        self.inner.settings.lock().lookup_failures = times;
    }

    pub fn set_steps(&self, steps: u8) {
        self.inner.settings.lock().steps = steps.max(1);
    }

    pub fn set_step_delay(&self, delay: Duration) {
        self.inner.settings.lock().step_delay = delay;
    }

    /// While held, uploads stop once they have reported `percent`.
    pub fn hold_at(&self, percent: u8) {
        self.inner.settings.lock().hold_at = percent.min(100);
        self.hold();
    }

    pub fn hold(&self) {
        self.inner.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.inner.gate.send_replace(true);
    }

    /// Keep transfers parked at the hold point even after cancellation.
    pub fn ignore_cancellation(&self, ignore: bool) {
        self.inner.settings.lock().ignore_cancel = ignore;
    }

    pub fn held(&self) -> usize {
        self.inner.held.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` uploads are parked.
    pub async fn wait_held(&self, count: usize) {
        loop {
            let notified = self.inner.held_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.held() >= count {
                return;
            }
            notified.await;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.inner.attempts.lock().len()
    }

    pub fn uploads_of(&self, name: &str) -> usize {
        self.inner
            .attempts
            .lock()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }

    /// Names of uploaded payloads in the order their attempts started.
    pub fn attempt_log(&self) -> Vec<String> {
        self.inner.attempts.lock().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.inner.lookups.load(Ordering::SeqCst)
    }

    async fn park(&self, cancel: &CancellationToken) -> Result<(), TransportError> {
        let mut gate = self.inner.gate.subscribe();
        if *gate.borrow_and_update() {
            return Ok(());
        }
        let _held = HeldGuard::enter(&self.inner);
        let ignore_cancel = self.inner.settings.lock().ignore_cancel;
        loop {
            if ignore_cancel {
                if gate.changed().await.is_err() {
                    return Ok(());
                }
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    changed = gate.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            if *gate.borrow_and_update() {
                return Ok(());
            }
        }
    }
}

struct FlightGuard<'a>(&'a Inner);

impl<'a> FlightGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct HeldGuard<'a>(&'a Inner);

impl<'a> HeldGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.held.fetch_add(1, Ordering::SeqCst);
        inner.held_changed.notify_waiters();
        Self(inner)
    }
}

impl Drop for HeldGuard<'_> {
    fn drop(&mut self) {
        self.0.held.fetch_sub(1, Ordering::SeqCst);
        self.0.held_changed.notify_waiters();
    }
}

#[async_trait]
impl Transport for MemoryRemote {
    async fn upload(&self, request: UploadRequest) -> Result<StoredObject, TransportError> {
        let name = request.payload.name().to_string();
        let _flight = FlightGuard::enter(&self.inner);
        self.inner.attempts.lock().push(name.clone());

        // Held at 0%: park before injected failures or rejections apply.
        let hold_at = self.inner.settings.lock().hold_at;
        let mut parked = false;
        if hold_at == 0 {
            self.park(&request.cancel).await?;
            parked = true;
        }

        let plan = {
            let mut settings = self.inner.settings.lock();
            if settings.rejects.contains(&name) {
                Err(TransportError::Rejected(format!("{name} refused by remote")))
            } else if let Some(left) = settings.failures.get_mut(&name).filter(|left| **left > 0) {
                *left -= 1;
                Err(TransportError::Transient(format!("injected failure for {name}")))
            } else {
                Ok((settings.steps, settings.step_delay))
            }
        };
        let (steps, step_delay) = match plan {
            Ok(plan) => plan,
            Err(e) => {
                tokio::task::yield_now().await;
                return Err(e);
            }
        };

        for step in 1..=steps {
            if request.cancel.is_cancelled() && !self.inner.settings.lock().ignore_cancel {
                return Err(TransportError::Cancelled);
            }
            let percent = (u32::from(step) * 100 / u32::from(steps)) as u8;
            request.progress.report(percent);
            if !parked && percent >= hold_at {
                self.park(&request.cancel).await?;
                parked = true;
            }
            if step_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(step_delay).await;
            }
        }

        let object = stored_object(
            &request.metadata.scope,
            request.fingerprint,
            request.payload.len() as u64,
            request.media,
        );
        self.inner
            .objects
            .lock()
            .insert((object.scope.clone(), object.fingerprint), object.clone());
        Ok(object)
    }
}

#[async_trait]
impl Inventory for MemoryRemote {
    async fn find_by_hash(
        &self,
        scope: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredObject>, InventoryError> {
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        {
            let mut settings = self.inner.settings.lock();
            if settings.lookup_failures > 0 {
                settings.lookup_failures -= 1;
                return Err(InventoryError::Unavailable("injected lookup failure".into()));
            }
        }
        Ok(self
            .inner
            .objects
            .lock()
            .get(&(scope.to_string(), *fingerprint))
            .cloned())
    }
}

fn stored_object(scope: &str, fp: Fingerprint, size: u64, media: MediaKind) -> StoredObject {
    let stored_at_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    StoredObject {
        key: format!("{scope}/{fp}"),
        scope: scope.to_string(),
        fingerprint: fp,
        size,
        stored_at_ms,
        media_type: (media != MediaKind::Other).then(|| media.mime_type().to_string()),
    }
}
