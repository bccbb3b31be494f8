// src/ledger/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::UnitStatus;

/// The whole ledger document: service name -> [`ServiceStatus`].
///
/// Serialized as a single JSON object keyed by service name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerDocument {
    services: BTreeMap<String, ServiceStatus>,
}

impl LedgerDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn service(&self, service: &str) -> Option<&ServiceStatus> {
        self.services.get(service)
    }

    /// Mutable access, creating a disabled, empty service on first use.
    pub fn service_mut(&mut self, service: &str) -> &mut ServiceStatus {
        self.services.entry(service.to_string()).or_default()
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceStatus)> {
        self.services.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn unit(&self, service: &str, name: &str) -> Option<&UnitEntry> {
        self.services.get(service).and_then(|s| s.units.get(name))
    }

    pub fn unit_mut(&mut self, service: &str, name: &str) -> Option<&mut UnitEntry> {
        self.services
            .get_mut(service)
            .and_then(|s| s.units.get_mut(name))
    }
}

/// Enablement flag plus all units of one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub units: BTreeMap<String, UnitEntry>,
}

/// Metadata of one unit.
///
/// `trigger` and `schedule` are either both empty or both set; when set, a
/// matching scheduler line is expected to exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitEntry {
    pub runtime: String,
    pub trigger: String,
    pub schedule: String,
    pub source_text: String,
    pub status: UnitStatus,
    pub executions: Vec<ExecutionRecord>,
}

impl UnitEntry {
    pub fn is_triggered(&self) -> bool {
        !self.trigger.is_empty()
    }

    /// Append a record, keeping at most `limit` of the newest ones.
    pub fn push_execution(&mut self, record: ExecutionRecord, limit: usize) {
        self.executions.push(record);
        if self.executions.len() > limit {
            let excess = self.executions.len() - limit;
            self.executions.drain(..excess);
        }
    }
}

/// Result classification of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

impl ExecutionStatus {
    /// Uppercase tag used in log markers.
    pub fn tag(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
        }
    }

    /// Anything other than a case-insensitive `error` counts as success.
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case("error") {
            ExecutionStatus::Error
        } else {
            ExecutionStatus::Success
        }
    }

    pub fn unit_status(self) -> UnitStatus {
        match self {
            ExecutionStatus::Success => UnitStatus::Success,
            ExecutionStatus::Error => UnitStatus::Failed,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => f.write_str("success"),
            ExecutionStatus::Error => f.write_str("error"),
        }
    }
}

/// One timestamped run. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// RFC3339 timestamp, kept as text so it round-trips verbatim.
    pub timestamp: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    pub status: ExecutionStatus,
}

impl ExecutionRecord {
    /// Build a record whose combined output lands in `output` on success and
    /// in `error` on failure, the same split the log format preserves.
    ///
    /// Non-empty text is newline-terminated here, as the log stores it, so
    /// the returned record, the ledger copy and the decoded log agree.
    pub fn new(timestamp: impl Into<String>, status: ExecutionStatus, text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        let (output, error) = match status {
            ExecutionStatus::Success => (text, String::new()),
            ExecutionStatus::Error => (String::new(), text),
        };
        Self {
            timestamp: timestamp.into(),
            output,
            error,
            status,
        }
    }

    /// The text that belongs to this record's status.
    pub fn text(&self) -> &str {
        match self.status {
            ExecutionStatus::Success => &self.output,
            ExecutionStatus::Error => &self.error,
        }
    }
}
