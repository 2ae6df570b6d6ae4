//! Fire-and-forget settings persistence.
//!
//! Callers hand the [`Flusher`] a snapshot after every change and move on.
//! Each snapshot gets a generation number; a write only lands if no newer
//! snapshot has already been written, so a slow background write can never
//! roll the file back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::document::SettingsDocument;
use crate::error::SettingsResult;
use crate::traits::SettingsStore;

struct Inner {
    store: Arc<dyn SettingsStore>,
    next_generation: AtomicU64,
    /// Generation of the newest snapshot persisted so far.
    written: Mutex<u64>,
    failed: AtomicBool,
}

impl Inner {
    /// Returns `Ok(false)` when the snapshot was superseded and skipped.
    fn write(&self, generation: u64, document: &SettingsDocument) -> SettingsResult<bool> {
        let mut written = self.written.lock().expect("flush lock poisoned");
        if generation <= *written {
            debug!(generation, written = *written, "skipping stale settings snapshot");
            return Ok(false);
        }
        match self.store.flush(document) {
            Ok(()) => {
                *written = generation;
                self.failed.store(false, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) => {
                warn!(generation, error = %e, "settings flush failed; keeping in-memory state");
                self.failed.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

/// Serializes settings writes and drops stale snapshots.
pub struct Flusher {
    inner: Arc<Inner>,
    background: bool,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Flusher {
    /// With `background` set, snapshots are written on tokio's blocking pool
    /// when a runtime is running, and inline otherwise.
    pub fn new(store: Arc<dyn SettingsStore>, background: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                next_generation: AtomicU64::new(0),
                written: Mutex::new(0),
                failed: AtomicBool::new(false),
            }),
            background,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn next_generation(&self) -> u64 {
        self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Queue a snapshot for writing. Failures are logged, never returned;
    /// check [`has_failed`](Flusher::has_failed).
    pub fn submit(&self, document: SettingsDocument) {
        let generation = self.next_generation();

        if self.background {
            if let Ok(handle) = Handle::try_current() {
                let inner = Arc::clone(&self.inner);
                let task = handle.spawn_blocking(move || {
                    let _ = inner.write(generation, &document);
                });
                let mut pending = self.pending.lock().expect("flush lock poisoned");
                pending.retain(|t| !t.is_finished());
                pending.push(task);
                return;
            }
        }

        let _ = self.inner.write(generation, &document);
    }

    /// Write a snapshot now and report the outcome.
    pub fn flush_now(&self, document: &SettingsDocument) -> SettingsResult<()> {
        let generation = self.next_generation();
        self.inner.write(generation, document).map(|_| ())
    }

    /// Wait for every queued background write to finish.
    pub async fn settle(&self) {
        let tasks = std::mem::take(&mut *self.pending.lock().expect("flush lock poisoned"));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "settings flush task did not complete");
            }
        }
    }

    /// `true` if the most recent write attempt failed.
    pub fn has_failed(&self) -> bool {
        self.inner.failed.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.inner.store
    }
}

impl std::fmt::Debug for Flusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flusher")
            .field("background", &self.background)
            .field("failed", &self.has_failed())
            .finish()
    }
}
