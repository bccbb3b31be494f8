// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{Runtime, SchedulerBackend};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [paths]
/// root = "/var/lib/runledger"
///
/// [scheduler]
/// backend = "file"
/// table = "crontab"
///
/// [history]
/// limit = 20
///
/// [runtimes]
/// python = "python3.12"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub history: HistorySection,

    /// Interpreter overrides keyed by runtime name (`shell`, `bash`,
    /// `python`, `node`).
    #[serde(default)]
    pub runtimes: BTreeMap<String, String>,
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Directory holding the ledger, unit sources and logs.
    ///
    /// Relative paths are resolved against the current working directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".runledger")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default)]
    pub backend: SchedulerBackend,

    /// Table file for the `file` backend, relative to `paths.root` unless
    /// absolute.
    #[serde(default = "default_table")]
    pub table: PathBuf,
}

fn default_table() -> PathBuf {
    PathBuf::from("crontab")
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            backend: SchedulerBackend::default(),
            table: default_table(),
        }
    }
}

/// `[history]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySection {
    /// How many executions are mirrored into each ledger entry. The log file
    /// keeps everything.
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

/// Validated configuration.
///
/// Built from a [`RawConfigFile`] through `TryFrom`, which checks the
/// invariants in `validate.rs`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub scheduler: SchedulerSection,
    pub history: HistorySection,
    interpreters: BTreeMap<Runtime, String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        paths: PathsSection,
        scheduler: SchedulerSection,
        history: HistorySection,
        interpreters: BTreeMap<Runtime, String>,
    ) -> Self {
        Self {
            paths,
            scheduler,
            history,
            interpreters,
        }
    }

    /// Program used to execute sources of the given runtime.
    pub fn interpreter(&self, runtime: Runtime) -> &str {
        self.interpreters
            .get(&runtime)
            .map(String::as_str)
            .unwrap_or_else(|| runtime.default_interpreter())
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            PathsSection::default(),
            SchedulerSection::default(),
            HistorySection::default(),
            BTreeMap::new(),
        )
    }
}
