// src/schedule/line.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, RunledgerError};

static CRON_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z*,/\-]+$").expect("literal pattern compiles"));

const CRON_MACROS: &[&str] = &[
    "@reboot",
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

/// One scheduler line written for a triggered function:
///
/// `<cron-expr> <interpreter> <unit_path> >> <log_path> 2>&1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronLine {
    pub schedule: String,
    pub interpreter: String,
    pub unit_path: PathBuf,
    pub log_path: PathBuf,
}

impl CronLine {
    pub fn new(
        schedule: impl Into<String>,
        interpreter: impl Into<String>,
        unit_path: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            schedule: schedule.into(),
            interpreter: interpreter.into(),
            unit_path: unit_path.into(),
            log_path: log_path.into(),
        }
    }
}

impl fmt::Display for CronLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} >> {} 2>&1",
            self.schedule.trim(),
            self.interpreter,
            shell_quote(&self.unit_path),
            shell_quote(&self.log_path)
        )
    }
}

/// `path` as one POSIX shell word: bare when every character is safe,
/// single-quoted otherwise.
pub fn shell_quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let safe = !raw.is_empty()
        && raw.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ',' | ':' | '@')
        });
    if safe {
        return raw.into_owned();
    }
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Whether `line` runs the unit at `unit_path`.
///
/// Looks for the path in its rendered (possibly quoted) form, bounded by
/// whitespace or the line ends, so `/x/job.py` does not match a line for
/// `/x/job.py.bak`.
pub fn references_unit(line: &str, unit_path: &Path) -> bool {
    let needle = shell_quote(unit_path);
    line.match_indices(needle.as_str()).any(|(start, _)| {
        let end = start + needle.len();
        let open = line[..start].chars().next_back().is_none_or(char::is_whitespace);
        let close = line[end..].chars().next().is_none_or(char::is_whitespace);
        open && close
    })
}

/// Accept five cron fields or one of the `@` macros.
pub fn validate_cron_expression(expr: &str) -> Result<()> {
    let expr = expr.trim();

    if expr.starts_with('@') {
        if CRON_MACROS.contains(&expr) {
            return Ok(());
        }
        return Err(RunledgerError::InvalidTrigger(format!(
            "unknown cron macro {expr:?}"
        )));
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(RunledgerError::InvalidTrigger(format!(
            "cron expression {expr:?} must have 5 fields (got {})",
            fields.len()
        )));
    }

    if let Some(bad) = fields.iter().find(|f| !CRON_FIELD.is_match(f)) {
        return Err(RunledgerError::InvalidTrigger(format!(
            "invalid cron field {bad:?} in {expr:?}"
        )));
    }

    Ok(())
}
