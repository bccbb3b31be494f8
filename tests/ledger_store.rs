// tests/ledger_store.rs

use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::thread;

use tempfile::tempdir;

use runledger::errors::{ErrorKind, RunledgerError};
use runledger::ledger::{ExecutionRecord, ExecutionStatus, Ledger, LedgerDocument, UnitEntry};
use runledger::types::UnitStatus;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn missing_file_reads_as_empty_ledger() -> TestResult {
    let dir = tempdir()?;
    let ledger = Ledger::new(dir.path().join("state.json"));

    assert_eq!(ledger.read()?, LedgerDocument::new());
    assert!(!ledger.is_enabled("functions")?);
    assert!(ledger.unit("functions", "job")?.is_none());
    Ok(())
}

#[test]
fn malformed_file_is_reported_and_left_untouched() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("state.json");
    fs::write(&path, "{ not json")?;
    let ledger = Ledger::new(&path);

    let err = ledger.read().unwrap_err();
    assert!(matches!(err, RunledgerError::LedgerParse { .. }));
    assert_eq!(err.kind(), ErrorKind::Io);

    // Mutations fail too, without clobbering the file.
    assert!(ledger.enable("functions").is_err());
    assert_eq!(fs::read_to_string(&path)?, "{ not json");
    Ok(())
}

#[test]
fn enable_and_disable_round_trip_through_disk() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("state.json");
    let ledger = Ledger::new(&path);

    ledger.enable("functions")?;
    assert!(ledger.is_enabled("functions")?);
    assert!(!ledger.is_enabled("pipelines")?);

    // A fresh handle sees what the first one wrote.
    let reopened = Ledger::new(&path);
    assert!(reopened.is_enabled("functions")?);

    reopened.disable("functions")?;
    assert!(!ledger.is_enabled("functions")?);
    Ok(())
}

#[test]
fn document_uses_service_keyed_camel_case_json() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("state.json");
    let ledger = Ledger::new(&path);

    ledger.upsert_unit(
        "functions",
        "job",
        UnitEntry {
            runtime: "python".to_string(),
            trigger: "cron".to_string(),
            schedule: "*/5 * * * *".to_string(),
            source_text: "print('x')\n".to_string(),
            ..UnitEntry::default()
        },
    )?;

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    let entry = &json["functions"]["units"]["job"];
    assert_eq!(json["functions"]["enabled"], false);
    assert_eq!(entry["sourceText"], "print('x')\n");
    assert_eq!(entry["schedule"], "*/5 * * * *");
    assert_eq!(entry["status"], "idle");
    assert!(entry["executions"].as_array().is_some_and(|a| a.is_empty()));
    Ok(())
}

#[test]
fn failed_update_writes_nothing() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("state.json");
    let ledger = Ledger::new(&path);
    ledger.enable("pipelines")?;
    let before = fs::read_to_string(&path)?;

    let result: runledger::errors::Result<()> = ledger.update(|doc| {
        doc.service_mut("pipelines").enabled = false;
        Err(RunledgerError::NotRunning("pipelines/x".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&path)?, before);
    assert!(ledger.is_enabled("pipelines")?);
    Ok(())
}

#[test]
fn writes_leave_no_temp_file_behind() -> TestResult {
    let dir = tempdir()?;
    let ledger = Ledger::new(dir.path().join("state.json"));

    ledger.enable("pipelines")?;
    ledger.enable("functions")?;

    let names: Vec<String> = fs::read_dir(dir.path())?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(names, vec!["state.json".to_string()]);
    Ok(())
}

#[test]
fn set_status_reports_missing_units() -> TestResult {
    let dir = tempdir()?;
    let ledger = Ledger::new(dir.path().join("state.json"));

    assert!(!ledger.set_status("pipelines", "ghost", UnitStatus::Running)?);

    ledger.upsert_unit("pipelines", "build", UnitEntry::default())?;
    assert!(ledger.set_status("pipelines", "build", UnitStatus::Running)?);
    assert_eq!(
        ledger.unit("pipelines", "build")?.map(|e| e.status),
        Some(UnitStatus::Running)
    );

    assert!(ledger.remove_unit("pipelines", "build")?.is_some());
    assert!(ledger.remove_unit("pipelines", "build")?.is_none());
    Ok(())
}

#[test]
fn history_keeps_only_the_newest_records() {
    let mut entry = UnitEntry::default();
    for i in 0..5 {
        entry.push_execution(
            ExecutionRecord::new(format!("t{i}"), ExecutionStatus::Success, ""),
            3,
        );
    }

    let stamps: Vec<&str> = entry.executions.iter().map(|r| r.timestamp.as_str()).collect();
    assert_eq!(stamps, vec!["t2", "t3", "t4"]);
}

#[test]
fn concurrent_updates_are_not_lost() -> TestResult {
    let dir = tempdir()?;
    let ledger = Arc::new(Ledger::new(dir.path().join("state.json")));
    ledger.upsert_unit("functions", "counter", UnitEntry::default())?;

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..10 {
                    ledger
                        .update(|doc| {
                            let entry = doc
                                .unit_mut("functions", "counter")
                                .ok_or_else(|| RunledgerError::NotRunning("counter".into()))?;
                            entry.push_execution(
                                ExecutionRecord::new(format!("{t}-{i}"), ExecutionStatus::Success, ""),
                                1000,
                            );
                            Ok(())
                        })
                        .expect("ledger update");
                }
            })
        })
        .collect();

    for t in threads {
        t.join().expect("writer thread panicked");
    }

    let entry = ledger.unit("functions", "counter")?.expect("entry exists");
    assert_eq!(entry.executions.len(), 80);
    Ok(())
}
