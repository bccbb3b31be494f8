// src/schedule/store.rs

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::Result;
use crate::schedule::line::{CronLine, references_unit};

/// Abstract storage for the periodic-job table.
///
/// Backends only provide raw table IO; the line logic in `add`/`remove` is
/// shared so every backend behaves the same.
pub trait ScheduleStore: Send {
    /// Whole table as text. A table that does not exist yet is empty.
    fn read_table(&self) -> Result<String>;

    fn write_table(&mut self, table: &str) -> Result<()>;

    /// Non-blank lines of the table.
    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .read_table()?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append `line` unless an identical line is already present.
    ///
    /// Returns whether the table changed.
    fn add(&mut self, line: &CronLine) -> Result<bool> {
        let rendered = line.to_string();
        let mut table = self.read_table()?;

        if table.lines().any(|l| l.contains(&rendered)) {
            debug!(line = %rendered, "schedule line already present");
            return Ok(false);
        }

        if !table.is_empty() && !table.ends_with('\n') {
            table.push('\n');
        }
        table.push_str(&rendered);
        table.push('\n');

        self.write_table(&table)?;
        info!(line = %rendered, "schedule line added");
        Ok(true)
    }

    /// Drop every line that runs `unit_path`. Absent lines are not an error.
    ///
    /// Returns how many lines were removed.
    fn remove(&mut self, unit_path: &Path) -> Result<usize> {
        let table = self.read_table()?;

        let mut kept = String::with_capacity(table.len());
        let mut removed = 0;
        for line in table.lines() {
            if references_unit(line, unit_path) {
                removed += 1;
            } else {
                kept.push_str(line);
                kept.push('\n');
            }
        }

        if removed > 0 {
            self.write_table(&kept)?;
            info!(unit_path = ?unit_path, removed, "schedule lines removed");
        }
        Ok(removed)
    }
}

/// Table kept in a plain file.
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    path: PathBuf,
}

impl FileScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for FileScheduleStore {
    fn read_table(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(table) => Ok(table),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_table(&mut self, table: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, table)?;
        Ok(())
    }
}

/// Table held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryScheduleStore {
    table: String,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn read_table(&self) -> Result<String> {
        Ok(self.table.clone())
    }

    fn write_table(&mut self, table: &str) -> Result<()> {
        self.table = table.to_string();
        Ok(())
    }
}
