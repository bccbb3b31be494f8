use std::path::{Path, PathBuf};

use runledger::config::{ConfigFile, Layout};
use runledger::schedule::{FileScheduleStore, ScheduleStore, ScheduleSync};
use runledger::units::Catalog;
use tempfile::TempDir;

/// A catalog rooted in a fresh temp dir, with a file-backed scheduler table
/// so tests never touch the host crontab.
pub struct TestEnv {
    pub dir: TempDir,
    pub catalog: Catalog,
    table: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(ConfigFile::default())
    }

    pub fn with_config(config: ConfigFile) -> Self {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let layout = Layout::new(dir.path());
        let table = dir.path().join("crontab");
        let schedule = ScheduleSync::new(Box::new(FileScheduleStore::new(&table)));
        let catalog = Catalog::with_parts(config, layout, schedule);
        Self {
            dir,
            catalog,
            table,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Current scheduler table lines.
    pub fn schedule_lines(&self) -> Vec<String> {
        FileScheduleStore::new(&self.table)
            .list()
            .expect("reading schedule table")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
