//! The flush controller: double-buffered rotation between a *current*
//! registry ingress mutates and a *retired* one a background worker
//! serializes, per spec.md §4.5. Generalizes the teacher's
//! `ArcSwap<Aggregator>` handoff (`collector.rs`/`job.rs`) from a
//! client-side aggregator swap to an ingress-side one, modeled as an
//! explicit `Daemon` handle rather than the teacher's process-wide
//! statics (per §9's "re-architect as an explicit handle" note).

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tracing::error;

use crate::config::DaemonConfig;
use crate::registry::Registry;

/// Owns the current-registry pointer and the handle of the most recent
/// flush worker.
pub struct Daemon {
    current: ArcSwapOption<Registry>,
    config: Arc<DaemonConfig>,
    last_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Daemon {
    /// Builds a daemon with a fresh registry for the epoch starting at
    /// `created_at` (Unix seconds).
    #[must_use]
    pub fn new(config: Arc<DaemonConfig>, created_at: u64) -> Self {
        let registry = Arc::new(Registry::new(config.clone(), created_at));
        Self {
            current: ArcSwapOption::from(Some(registry)),
            config,
            last_worker: Mutex::new(None),
        }
    }

    /// A strong handle to the registry currently accepting samples, or
    /// `None` after [`Self::final_flush`].
    #[must_use]
    pub fn current(&self) -> Option<Arc<Registry>> {
        self.current.load_full()
    }

    /// Rotates the active registry: builds a fresh empty one for
    /// `next_created_at`, atomically swaps it in, and spawns a detached
    /// worker that serializes the retired registry to `sink` once every
    /// in-flight `add_sample` on it has completed. Fire-and-forget: any
    /// still-unjoined handle from a previous `rotate` is simply replaced
    /// (and, with it, detached) rather than waited on — callers that need
    /// every flush drained use [`Self::final_flush`].
    pub fn rotate<W>(&self, next_created_at: u64, sink: W)
    where
        W: Write + Send + 'static,
    {
        let fresh = Arc::new(Registry::new(self.config.clone(), next_created_at));
        let retired = self.current.swap(Some(fresh));
        let Some(retired) = retired else { return };
        retired.mark_rotated();
        let handle = Self::spawn_worker(retired, sink);
        let mut guard = self
            .last_worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(handle);
    }

    /// Performs one last rotation into a null sentinel — every
    /// subsequent `add_sample` on [`Self::current`] is therefore
    /// impossible, since there is no current registry to fetch — and
    /// blocks until both its own worker and any still-pending worker
    /// from an earlier `rotate` have finished.
    pub fn final_flush<W>(&self, sink: W)
    where
        W: Write + Send + 'static,
    {
        self.join_last_worker();
        let retired = self.current.swap(None);
        if let Some(retired) = retired {
            retired.mark_rotated();
            let handle = Self::spawn_worker(retired, sink);
            if handle.join().is_err() {
                error!("flush worker thread panicked during final flush");
            }
        }
    }

    fn spawn_worker<W>(retired: Arc<Registry>, mut sink: W) -> JoinHandle<()>
    where
        W: Write + Send + 'static,
    {
        thread::spawn(move || {
            let registry = await_sole_owner(retired);
            if let Err(err) = crate::serialize::serialize_registry(&registry, &mut sink) {
                error!(error = %err, "serializer sink write failed, flush aborted");
            }
            registry.destroy();
        })
    }

    fn join_last_worker(&self) {
        let handle = self
            .last_worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("flush worker thread panicked during a prior rotation");
            }
        }
    }
}

/// Blocks until no other `Arc<Registry>` reference is outstanding,
/// mirroring the teacher's `send_metrics`/`Arc::try_unwrap` retry loop
/// in `job.rs` (there gated by a tick channel; here a short sleep, since
/// this crate has no channel dependency of its own).
fn await_sole_owner(mut retired: Arc<Registry>) -> Arc<Registry> {
    loop {
        match Arc::try_unwrap(retired) {
            Ok(registry) => return Arc::new(registry),
            Err(arc) => {
                retired = arc;
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}
