// src/engine/mod.rs

//! Execution engine.
//!
//! Ties the process runner to the ledger, the log codec and the process
//! registry:
//!
//! - `run` claims the unit's registry slot, marks it `running` and spawns a
//!   detached task that executes the unit and then completes the run.
//! - completion releases the slot, appends a log block and writes the final
//!   status against the unit's *current* ledger entry.
//! - `stop` kills a running unit and marks it `idle`; its completion still
//!   records a failed execution.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{SecondsFormat, Utc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, Layout};
use crate::errors::{Result, RunledgerError};
use crate::exec::{
    ProcessOutcome, ProcessOutput, ProcessRegistry, ProcessRequest, Registration, run_process,
};
use crate::ledger::{ExecutionRecord, ExecutionStatus, Ledger};
use crate::logcodec;
use crate::naming::sanitize_name;
use crate::types::{Runtime, UnitKind, UnitStatus};

/// Registry key for a unit, e.g. `pipelines/build`.
pub fn unit_id(kind: UnitKind, name: &str) -> String {
    format!("{}/{}", kind.service(), name)
}

/// Current time in the format used by execution records.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A run that has been started. Dropping it does not affect the run.
#[derive(Debug)]
pub struct RunHandle {
    pub unit_id: String,
    pub run_id: u64,
    handle: JoinHandle<std::result::Result<ExecutionRecord, JoinError>>,
}

impl RunHandle {
    /// Wait for the run to complete and return the recorded execution.
    pub async fn wait(self) -> Result<ExecutionRecord> {
        match self.handle.await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(e)) | Err(e) => Err(RunledgerError::Other(anyhow!(
                "run task for {} failed: {e}",
                self.unit_id
            ))),
        }
    }
}

/// Runs units and records their results. Cheap to clone; clones share the
/// same ledger and registry.
#[derive(Debug, Clone)]
pub struct Engine {
    ledger: Arc<Ledger>,
    registry: Arc<ProcessRegistry>,
    layout: Layout,
    config: Arc<ConfigFile>,
}

impl Engine {
    pub fn new(
        ledger: Arc<Ledger>,
        registry: Arc<ProcessRegistry>,
        layout: Layout,
        config: Arc<ConfigFile>,
    ) -> Self {
        Self {
            ledger,
            registry,
            layout,
            config,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn is_running(&self, kind: UnitKind, name: &str) -> bool {
        self.registry.is_running(&unit_id(kind, name))
    }

    /// Start a run of `name` and return without waiting for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, kind: UnitKind, name: &str) -> Result<RunHandle> {
        let name = sanitize_name(name)?;
        let service = kind.service();
        let not_found = || RunledgerError::UnitNotFound {
            kind,
            name: name.clone(),
        };

        let entry = self.ledger.unit(service, &name)?.ok_or_else(not_found)?;
        let runtime: Runtime =
            entry
                .runtime
                .parse()
                .map_err(|_| RunledgerError::UnsupportedRuntime {
                    kind,
                    runtime: entry.runtime.clone(),
                })?;

        let source_path = self.layout.source_path(kind, &name, runtime);
        if !source_path.is_file() {
            return Err(not_found());
        }

        let unit_id = unit_id(kind, &name);
        let Registration { run_id, cancel_rx } = self.registry.register(&unit_id)?;

        match self.ledger.set_status(service, &name, UnitStatus::Running) {
            Ok(true) => {}
            Ok(false) => {
                self.registry.complete(&unit_id, run_id);
                return Err(not_found());
            }
            Err(e) => {
                self.registry.complete(&unit_id, run_id);
                return Err(e);
            }
        }

        let req = ProcessRequest {
            unit_id: unit_id.clone(),
            run_id,
            interpreter: self.config.interpreter(runtime).to_string(),
            source_path,
        };

        info!(unit = %unit_id, run_id, "run started");

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let output = run_process(&req, cancel_rx).await;
            // Log append and ledger fsync block; keep them off the workers.
            tokio::task::spawn_blocking(move || engine.complete(kind, &name, &req, output)).await
        });

        Ok(RunHandle {
            unit_id,
            run_id,
            handle,
        })
    }

    /// Kill a running unit and mark it idle.
    ///
    /// Fails with `NotRunning`, without touching the ledger, if the unit has
    /// no registry entry. A ledger that cannot be read does not prevent the
    /// kill; its error is returned once the process has been cancelled.
    pub fn stop(&self, kind: UnitKind, name: &str) -> Result<()> {
        let name = sanitize_name(name)?;
        let service = kind.service();
        let unit_id = unit_id(kind, &name);

        // Cancel under the ledger lock so the run's completion, which also
        // needs that lock, always lands after the idle status. The kill goes
        // out before the document is read, so an unreadable ledger cannot
        // keep the process alive.
        let (run_id, ()) = self.ledger.update_after(
            || self.registry.cancel(&unit_id),
            |doc, run_id| {
                match doc.unit_mut(service, &name) {
                    Some(entry) => entry.status = UnitStatus::Idle,
                    None => warn!(unit = %unit_id, run_id, "stopped unit has no ledger entry"),
                }
                Ok(())
            },
        )?;

        info!(unit = %unit_id, run_id, "run stopped");
        Ok(())
    }

    /// Completion path of a run. Failures here are logged, not returned: the
    /// run has already happened and the record is still handed back.
    fn complete(
        &self,
        kind: UnitKind,
        name: &str,
        req: &ProcessRequest,
        output: ProcessOutput,
    ) -> ExecutionRecord {
        if !self.registry.complete(&req.unit_id, req.run_id) {
            debug!(unit = %req.unit_id, run_id = req.run_id, "registry entry already removed (stopped)");
        }

        let record = build_record(&output);
        let log_path = self.layout.log_path(kind, name);
        if let Err(e) = logcodec::append(&log_path, &record) {
            error!(unit = %req.unit_id, run_id = req.run_id, path = ?log_path, error = %e, "failed to append execution log");
        }

        let service = kind.service();
        let limit = self.config.history.limit;
        let final_status = record.status.unit_status();

        let written = self.ledger.update(|doc| {
            let Some(entry) = doc.unit_mut(service, name) else {
                return Ok(false);
            };
            entry.push_execution(record.clone(), limit);
            // A newer run may already own the unit; its status wins.
            if !self.registry.is_running(&req.unit_id) {
                entry.status = final_status;
            }
            Ok(true)
        });

        match written {
            Ok(true) => info!(
                unit = %req.unit_id,
                run_id = req.run_id,
                status = %final_status,
                "run recorded"
            ),
            Ok(false) => warn!(unit = %req.unit_id, run_id = req.run_id, "unit removed while running; ledger not updated"),
            Err(e) => error!(unit = %req.unit_id, run_id = req.run_id, error = %e, "failed to record run in ledger"),
        }

        record
    }
}

fn build_record(output: &ProcessOutput) -> ExecutionRecord {
    let status = if output.success() {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Error
    };

    let mut text = logcodec::combine_output(&output.stdout, &output.stderr);
    if let ProcessOutcome::SpawnFailed(msg) = &output.outcome {
        text.push_str(msg);
        text.push('\n');
    }

    ExecutionRecord::new(timestamp_now(), status, text)
}
