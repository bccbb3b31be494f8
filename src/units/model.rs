// src/units/model.rs

use std::path::PathBuf;

use crate::errors::{Result, RunledgerError};
use crate::ledger::{ExecutionRecord, UnitEntry};
use crate::naming::sanitize_name;
use crate::schedule::validate_cron_expression;
use crate::types::{Runtime, Trigger, UnitKind, UnitStatus};

/// A unit as submitted by a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDefinition {
    pub name: String,
    /// Runtime name; empty means the kind's default.
    pub runtime: String,
    pub source: String,
    /// Cron expression; `None` or blank means no trigger.
    pub cron: Option<String>,
}

/// A definition that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidUnit {
    pub name: String,
    pub runtime: Runtime,
    pub source: String,
    pub trigger: Option<Trigger>,
}

impl UnitDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Check everything that can be checked without touching disk.
    pub fn validate(&self, kind: UnitKind) -> Result<ValidUnit> {
        let name = sanitize_name(&self.name)?;

        if self.source.trim().is_empty() {
            return Err(RunledgerError::EmptySource(name));
        }

        let runtime = if self.runtime.trim().is_empty() {
            kind.default_runtime()
        } else {
            self.runtime
                .parse::<Runtime>()
                .map_err(|_| RunledgerError::UnsupportedRuntime {
                    kind,
                    runtime: self.runtime.clone(),
                })?
        };
        if !kind.supports(runtime) {
            return Err(RunledgerError::UnsupportedRuntime {
                kind,
                runtime: runtime.to_string(),
            });
        }

        let trigger = match self.cron.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(expr) => {
                if kind != UnitKind::Function {
                    return Err(RunledgerError::InvalidTrigger(format!(
                        "only functions can be triggered ({kind} '{name}' has cron {expr:?})"
                    )));
                }
                validate_cron_expression(expr)?;
                Some(Trigger::Cron(expr.to_string()))
            }
        };

        Ok(ValidUnit {
            name,
            runtime,
            source: self.source.clone(),
            trigger,
        })
    }
}

/// One row of a unit listing.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSummary {
    pub kind: UnitKind,
    pub name: String,
    pub runtime: String,
    pub trigger: Option<Trigger>,
    pub status: UnitStatus,
    /// Whether the source file exists on disk.
    pub source_present: bool,
    /// Whether the ledger has an entry for it.
    pub in_ledger: bool,
    pub last_execution: Option<ExecutionRecord>,
}

impl UnitSummary {
    pub(crate) fn from_entry(kind: UnitKind, name: &str, entry: &UnitEntry, source_present: bool) -> Self {
        Self {
            kind,
            name: name.to_string(),
            runtime: entry.runtime.clone(),
            trigger: Trigger::from_ledger_fields(&entry.trigger, &entry.schedule),
            status: entry.status,
            source_present,
            in_ledger: true,
            last_execution: entry.executions.last().cloned(),
        }
    }

    pub(crate) fn from_file(kind: UnitKind, name: &str, runtime: Option<Runtime>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            runtime: runtime.map(|r| r.name().to_string()).unwrap_or_default(),
            trigger: None,
            status: UnitStatus::Idle,
            source_present: true,
            in_ledger: false,
            last_execution: None,
        }
    }
}

/// Everything known about one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDetail {
    pub summary: UnitSummary,
    pub source: String,
    pub source_path: Option<PathBuf>,
    pub log_path: PathBuf,
}
