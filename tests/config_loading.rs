// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use runledger::config::{ConfigFile, Layout, RawConfigFile, load_and_validate};
use runledger::errors::RunledgerError;
use runledger::types::{Runtime, SchedulerBackend, UnitKind};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Runledger.toml");
    fs::write(&path, "")?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.paths.root, PathBuf::from(".runledger"));
    assert_eq!(cfg.scheduler.backend, SchedulerBackend::Crontab);
    assert_eq!(cfg.history.limit, 20);
    assert_eq!(cfg.interpreter(Runtime::Python), "python3");
    assert_eq!(cfg.interpreter(Runtime::Shell), "sh");
    Ok(())
}

#[test]
fn sections_and_runtime_overrides_are_applied() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Runledger.toml");
    fs::write(
        &path,
        r#"
[paths]
root = "/var/lib/runledger"

[scheduler]
backend = "file"
table = "jobs.cron"

[history]
limit = 5

[runtimes]
python = "python3.12"
nodejs = "/opt/node/bin/node"
"#,
    )?;

    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.scheduler.backend, SchedulerBackend::File);
    assert_eq!(cfg.history.limit, 5);
    assert_eq!(cfg.interpreter(Runtime::Python), "python3.12");
    assert_eq!(cfg.interpreter(Runtime::Node), "/opt/node/bin/node");
    assert_eq!(cfg.interpreter(Runtime::Bash), "bash");

    let layout = Layout::resolve(&cfg)?;
    assert_eq!(layout.ledger_path(), PathBuf::from("/var/lib/runledger/state.json"));
    assert_eq!(
        layout.source_path(UnitKind::Function, "job", Runtime::Python),
        PathBuf::from("/var/lib/runledger/functions/job.py")
    );
    assert_eq!(
        layout.log_path(UnitKind::Pipeline, "build"),
        PathBuf::from("/var/lib/runledger/logs/pipelines/build.log")
    );
    assert_eq!(
        layout.schedule_table(&cfg),
        PathBuf::from("/var/lib/runledger/jobs.cron")
    );
    Ok(())
}

#[test]
fn zero_history_limit_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.history.limit = 0;

    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(RunledgerError::ConfigError(_))
    ));
}

#[test]
fn unknown_runtime_override_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.runtimes.insert("ruby".to_string(), "ruby".to_string());

    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(RunledgerError::ConfigError(msg)) if msg.contains("ruby")
    ));
}

#[test]
fn blank_interpreter_override_is_rejected() {
    let mut raw = RawConfigFile::default();
    raw.runtimes.insert("bash".to_string(), "  ".to_string());

    assert!(ConfigFile::try_from(raw).is_err());
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Runledger.toml");
    fs::write(&path, "[history]\nlimit = \"many\"\n")?;

    assert!(matches!(
        load_and_validate(&path),
        Err(RunledgerError::TomlError(_))
    ));
    Ok(())
}
