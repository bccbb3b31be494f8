// src/schedule/crontab.rs

//! Host crontab backend, driven through the `crontab` program.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::errors::{Result, RunledgerError};
use crate::schedule::store::ScheduleStore;

#[derive(Debug, Clone)]
pub struct CrontabStore {
    program: String,
}

impl CrontabStore {
    pub fn new() -> Self {
        Self::with_program("crontab")
    }

    /// Use a different `crontab`-compatible program (`-l` to list, `-` to
    /// install from stdin).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for CrontabStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore for CrontabStore {
    fn read_table(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-l")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                RunledgerError::ScheduleError(format!("running `{} -l`: {e}", self.program))
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("no crontab") {
            debug!("no crontab installed yet; treating as empty");
            return Ok(String::new());
        }

        Err(RunledgerError::ScheduleError(format!(
            "`{} -l` failed ({}): {}",
            self.program,
            output.status,
            stderr.trim()
        )))
    }

    fn write_table(&mut self, table: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RunledgerError::ScheduleError(format!("running `{} -`: {e}", self.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(table.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(RunledgerError::ScheduleError(format!(
                "`{} -` failed ({}): {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}
