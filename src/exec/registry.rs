// src/exec/registry.rs

//! In-memory map of running units, used to cancel them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::{Result, RunledgerError};

/// Handle for a currently-running unit process.
///
/// - `run_id` identifies this particular run, so a late completion of an old
///   run cannot evict a newer one.
/// - `cancel` asks the process runner to kill the child.
#[derive(Debug)]
struct ActiveRun {
    run_id: u64,
    cancel: Option<oneshot::Sender<()>>,
}

/// What the engine gets back from a successful registration.
#[derive(Debug)]
pub struct Registration {
    pub run_id: u64,
    pub cancel_rx: oneshot::Receiver<()>,
}

/// Unit id -> running process handle, behind one lock.
///
/// At most one entry per unit id exists at any time: the existence check and
/// the insert in [`ProcessRegistry::register`] happen under the same guard.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    active: Mutex<HashMap<String, ActiveRun>>,
    next_run_id: AtomicU64,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `unit_id`, failing with `AlreadyRunning` if taken.
    pub fn register(&self, unit_id: &str) -> Result<Registration> {
        let mut active = self.lock();

        match active.entry(unit_id.to_string()) {
            Entry::Occupied(_) => Err(RunledgerError::AlreadyRunning(unit_id.to_string())),
            Entry::Vacant(slot) => {
                let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1;
                let (cancel_tx, cancel_rx) = oneshot::channel();
                slot.insert(ActiveRun {
                    run_id,
                    cancel: Some(cancel_tx),
                });
                debug!(unit = %unit_id, run_id, "registered running unit");
                Ok(Registration { run_id, cancel_rx })
            }
        }
    }

    /// Remove the entry for `unit_id` and signal its runner to kill the child.
    ///
    /// The entry is gone when this returns; the child may still be exiting.
    pub fn cancel(&self, unit_id: &str) -> Result<u64> {
        let removed = self.lock().remove(unit_id);

        let Some(mut run) = removed else {
            return Err(RunledgerError::NotRunning(unit_id.to_string()));
        };

        match run.cancel.take() {
            Some(cancel) => {
                if cancel.send(()).is_err() {
                    debug!(
                        unit = %unit_id,
                        run_id = run.run_id,
                        "process already finished while cancelling"
                    );
                }
            }
            None => {
                debug!(unit = %unit_id, run_id = run.run_id, "no cancel sender present");
            }
        }

        Ok(run.run_id)
    }

    /// Drop the entry for `unit_id` if it still belongs to `run_id`.
    ///
    /// Returns whether an entry was removed.
    pub fn complete(&self, unit_id: &str, run_id: u64) -> bool {
        let mut active = self.lock();
        match active.get(unit_id) {
            Some(run) if run.run_id == run_id => {
                active.remove(unit_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self, unit_id: &str) -> bool {
        self.lock().contains_key(unit_id)
    }

    pub fn running_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self.lock().keys().cloned().collect();
        units.sort();
        units
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveRun>> {
        // Every critical section leaves the map consistent, so a panic while
        // holding the guard cannot leave it half-updated.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
