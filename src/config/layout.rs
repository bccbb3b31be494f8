// src/config/layout.rs

//! On-disk layout derived from `[paths]`.
//!
//! ```text
//! <root>/state.json
//! <root>/pipelines/<name>.sh
//! <root>/functions/<name>.<ext>
//! <root>/logs/<service>/<name>.log
//! ```
//!
//! Every path handed out is absolute, since scheduler lines embed them and
//! cron does not run in our working directory.

use std::path::{Path, PathBuf};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::types::{Runtime, UnitKind};

const LEDGER_FILE: &str = "state.json";
const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Use `root` as given; callers are expected to pass an absolute path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `[paths].root` against the current directory.
    pub fn resolve(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self::new(absolutize(&cfg.paths.root)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn source_dir(&self, kind: UnitKind) -> PathBuf {
        self.root.join(kind.service())
    }

    pub fn source_path(&self, kind: UnitKind, name: &str, runtime: Runtime) -> PathBuf {
        self.source_dir(kind)
            .join(format!("{name}.{}", runtime.extension()))
    }

    pub fn log_dir(&self, kind: UnitKind) -> PathBuf {
        self.root.join(LOGS_DIR).join(kind.service())
    }

    pub fn log_path(&self, kind: UnitKind, name: &str) -> PathBuf {
        self.log_dir(kind).join(format!("{name}.log"))
    }

    /// Scheduler table for the `file` backend.
    pub fn schedule_table(&self, cfg: &ConfigFile) -> PathBuf {
        self.root.join(&cfg.scheduler.table)
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
