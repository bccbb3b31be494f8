use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The two families of units, each stored under its own ledger service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum UnitKind {
    /// Shell scripts run on demand.
    Pipeline,
    /// Single-file programs, optionally triggered by cron.
    Function,
}

impl UnitKind {
    /// Ledger service name, also used as the directory name for sources and
    /// logs.
    pub fn service(self) -> &'static str {
        match self {
            UnitKind::Pipeline => "pipelines",
            UnitKind::Function => "functions",
        }
    }

    pub fn default_runtime(self) -> Runtime {
        Runtime::Shell
    }

    /// Whether `runtime` may be used by this kind of unit.
    pub fn supports(self, runtime: Runtime) -> bool {
        match self {
            UnitKind::Pipeline => matches!(runtime, Runtime::Shell | Runtime::Bash),
            UnitKind::Function => true,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Pipeline => f.write_str("pipeline"),
            UnitKind::Function => f.write_str("function"),
        }
    }
}

/// Interpreter family a unit's source is executed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Runtime {
    Shell,
    Bash,
    Python,
    Node,
}

impl Runtime {
    pub const ALL: [Runtime; 4] = [Runtime::Shell, Runtime::Bash, Runtime::Python, Runtime::Node];

    pub fn name(self) -> &'static str {
        match self {
            Runtime::Shell => "shell",
            Runtime::Bash => "bash",
            Runtime::Python => "python",
            Runtime::Node => "node",
        }
    }

    /// Program used when the config does not override it.
    pub fn default_interpreter(self) -> &'static str {
        match self {
            Runtime::Shell => "sh",
            Runtime::Bash => "bash",
            Runtime::Python => "python3",
            Runtime::Node => "node",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Runtime::Shell | Runtime::Bash => "sh",
            Runtime::Python => "py",
            Runtime::Node => "js",
        }
    }

    /// Best guess for a source file found on disk without ledger metadata.
    pub fn from_extension(ext: &str) -> Option<Runtime> {
        match ext {
            "sh" => Some(Runtime::Shell),
            "py" => Some(Runtime::Python),
            "js" => Some(Runtime::Node),
            _ => None,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shell" | "sh" => Ok(Runtime::Shell),
            "bash" => Ok(Runtime::Bash),
            "python" | "python3" => Ok(Runtime::Python),
            "node" | "nodejs" => Ok(Runtime::Node),
            other => Err(format!(
                "unknown runtime: {other} (expected \"shell\", \"bash\", \"python\" or \"node\")"
            )),
        }
    }
}

/// What causes a unit to run besides an explicit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Run by the host scheduler on a five-field cron expression.
    Cron(String),
}

impl Trigger {
    pub const CRON: &'static str = "cron";

    /// `(trigger, schedule)` strings as stored in the ledger.
    pub fn to_ledger_fields(trigger: Option<&Trigger>) -> (String, String) {
        match trigger {
            Some(Trigger::Cron(expr)) => (Trigger::CRON.to_string(), expr.clone()),
            None => (String::new(), String::new()),
        }
    }

    /// Inverse of [`Trigger::to_ledger_fields`]; empty fields mean no trigger.
    pub fn from_ledger_fields(trigger: &str, schedule: &str) -> Option<Trigger> {
        if trigger == Trigger::CRON && !schedule.is_empty() {
            Some(Trigger::Cron(schedule.to_string()))
        } else {
            None
        }
    }
}

/// Per-unit status as recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStatus::Idle => "idle",
            UnitStatus::Running => "running",
            UnitStatus::Success => "success",
            UnitStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where scheduler lines for triggered functions are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerBackend {
    /// The invoking user's crontab, through the `crontab` program.
    #[default]
    Crontab,
    /// A plain text file in crontab format.
    File,
    /// In memory only (lost on restart).
    Memory,
}
