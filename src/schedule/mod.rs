// src/schedule/mod.rs

//! Scheduler sync: one periodic-job line per triggered function.
//!
//! - [`line`] renders and matches lines, and validates cron expressions.
//! - [`store`] defines the [`ScheduleStore`] trait with file and in-memory
//!   backends.
//! - [`crontab`] is the host crontab backend.

pub mod crontab;
pub mod line;
pub mod store;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{ConfigFile, Layout};
use crate::errors::Result;
use crate::types::SchedulerBackend;

pub use crontab::CrontabStore;
pub use line::{CronLine, references_unit, shell_quote, validate_cron_expression};
pub use store::{FileScheduleStore, MemoryScheduleStore, ScheduleStore};

/// Serializes table updates made by this process over one backend.
pub struct ScheduleSync {
    store: Mutex<Box<dyn ScheduleStore>>,
}

impl std::fmt::Debug for ScheduleSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleSync").finish_non_exhaustive()
    }
}

impl ScheduleSync {
    pub fn new(store: Box<dyn ScheduleStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Backend selected by `[scheduler].backend`.
    pub fn from_config(cfg: &ConfigFile, layout: &Layout) -> Self {
        let store: Box<dyn ScheduleStore> = match cfg.scheduler.backend {
            SchedulerBackend::Crontab => Box::new(CrontabStore::new()),
            SchedulerBackend::File => Box::new(FileScheduleStore::new(layout.schedule_table(cfg))),
            SchedulerBackend::Memory => Box::new(MemoryScheduleStore::new()),
        };
        Self::new(store)
    }

    /// Ensure a line running `unit_path` on `cron` exists. Idempotent.
    pub fn add_schedule(
        &self,
        unit_path: &Path,
        cron: &str,
        interpreter: &str,
        log_path: &Path,
    ) -> Result<bool> {
        let line = CronLine::new(cron, interpreter, unit_path, log_path);
        self.lock().add(&line)
    }

    /// Remove every line running `unit_path`; a no-op if there is none.
    pub fn remove_schedule(&self, unit_path: &Path) -> Result<usize> {
        self.lock().remove(unit_path)
    }

    pub fn lines(&self) -> Result<Vec<String>> {
        self.lock().list()
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn ScheduleStore>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
