// src/ledger/store.rs

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::errors::{Result, RunledgerError};
use crate::ledger::model::{LedgerDocument, UnitEntry};
use crate::types::UnitStatus;

/// File-backed ledger with a single writer at a time.
///
/// Every mutation is a read-modify-write of the whole document performed
/// while holding `lock`; the lock is released only after the new document has
/// been renamed into place. Readers go straight to the file and see either
/// the old or the new document, never a partial one.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document.
    ///
    /// A missing file is an empty ledger (first run). A malformed file is a
    /// [`RunledgerError::LedgerParse`]; its contents are left untouched.
    pub fn read(&self) -> Result<LedgerDocument> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "ledger not found; starting empty");
                return Ok(LedgerDocument::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(LedgerDocument::new());
        }

        serde_json::from_str(&contents).map_err(|source| RunledgerError::LedgerParse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the whole document.
    pub fn write(&self, doc: &LedgerDocument) -> Result<()> {
        let _guard = self.lock();
        self.write_unlocked(doc)
    }

    /// Read, let `f` mutate, write back, all under the ledger lock.
    ///
    /// If `f` fails nothing is written.
    pub fn update<T>(&self, f: impl FnOnce(&mut LedgerDocument) -> Result<T>) -> Result<T> {
        let _guard = self.lock();
        let mut doc = self.read()?;
        let value = f(&mut doc)?;
        self.write_unlocked(&doc)?;
        Ok(value)
    }

    /// Like [`Ledger::update`], but runs `before` under the lock first.
    ///
    /// `before` takes effect even when the document then fails to read or
    /// parse; that error is returned afterwards and nothing is written.
    pub fn update_after<P, T>(
        &self,
        before: impl FnOnce() -> Result<P>,
        f: impl FnOnce(&mut LedgerDocument, &P) -> Result<T>,
    ) -> Result<(P, T)> {
        let _guard = self.lock();
        let pre = before()?;
        let mut doc = self.read()?;
        let value = f(&mut doc, &pre)?;
        self.write_unlocked(&doc)?;
        Ok((pre, value))
    }

    pub fn enable(&self, service: &str) -> Result<()> {
        self.set_enabled(service, true)
    }

    pub fn disable(&self, service: &str) -> Result<()> {
        self.set_enabled(service, false)
    }

    fn set_enabled(&self, service: &str, enabled: bool) -> Result<()> {
        self.update(|doc| {
            doc.service_mut(service).enabled = enabled;
            Ok(())
        })?;
        info!(service, enabled, "service enablement changed");
        Ok(())
    }

    pub fn is_enabled(&self, service: &str) -> Result<bool> {
        Ok(self.read()?.service(service).is_some_and(|s| s.enabled))
    }

    pub fn unit(&self, service: &str, name: &str) -> Result<Option<UnitEntry>> {
        Ok(self.read()?.unit(service, name).cloned())
    }

    pub fn upsert_unit(&self, service: &str, name: &str, entry: UnitEntry) -> Result<()> {
        self.update(|doc| {
            doc.service_mut(service).units.insert(name.to_string(), entry);
            Ok(())
        })
    }

    /// Remove a unit, returning its last entry if there was one.
    pub fn remove_unit(&self, service: &str, name: &str) -> Result<Option<UnitEntry>> {
        self.update(|doc| Ok(doc.service_mut(service).units.remove(name)))
    }

    /// Set a unit's status. Returns `false` if the unit has no entry.
    pub fn set_status(&self, service: &str, name: &str, status: UnitStatus) -> Result<bool> {
        self.update(|doc| match doc.unit_mut(service, name) {
            Some(entry) => {
                entry.status = status;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write to a sibling temp file, flush it, and rename over the target.
    fn write_unlocked(&self, doc: &LedgerDocument) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger".to_string());
        let tmp_path = parent.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_string_pretty(doc)?;
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = ?self.path, bytes = json.len(), "ledger written");
        Ok(())
    }
}
