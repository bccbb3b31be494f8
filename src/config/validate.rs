// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RunledgerError};
use crate::types::Runtime;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RunledgerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_history(&raw)?;
        let interpreters = resolve_interpreters(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.paths,
            raw.scheduler,
            raw.history,
            interpreters,
        ))
    }
}

fn validate_history(cfg: &RawConfigFile) -> Result<()> {
    if cfg.history.limit == 0 {
        return Err(RunledgerError::ConfigError(
            "[history].limit must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn resolve_interpreters(cfg: &RawConfigFile) -> Result<BTreeMap<Runtime, String>> {
    let mut interpreters = BTreeMap::new();

    for (name, program) in cfg.runtimes.iter() {
        let runtime: Runtime = name
            .parse()
            .map_err(|e: String| RunledgerError::ConfigError(format!("[runtimes]: {e}")))?;

        let program = program.trim();
        if program.is_empty() {
            return Err(RunledgerError::ConfigError(format!(
                "[runtimes].{name} must name an interpreter program"
            )));
        }

        interpreters.insert(runtime, program.to_string());
    }

    Ok(interpreters)
}
