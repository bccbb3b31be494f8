// tests/engine_runs.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use runledger::config::{ConfigFile, RawConfigFile};
use runledger::errors::RunledgerError;
use runledger::ledger::ExecutionStatus;
use runledger::logcodec::{self, END_MARKER};
use runledger::types::{UnitKind, UnitStatus};
use runledger_test_utils::builders::UnitBuilder;
use runledger_test_utils::{TestEnv, init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn status_of(env: &TestEnv, kind: UnitKind, name: &str) -> Option<UnitStatus> {
    env.catalog
        .ledger()
        .unit(kind.service(), name)
        .ok()
        .flatten()
        .map(|e| e.status)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn successful_run_is_logged_once_and_recorded() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("build", "echo hi").build())?;

    let handle = env.catalog.run(UnitKind::Pipeline, "build")?;
    assert_eq!(handle.unit_id, "pipelines/build");
    let record = with_timeout(handle.wait()).await?;

    assert_eq!(record.status, ExecutionStatus::Success);
    assert_eq!(record.output, "hi\n");
    assert_eq!(record.error, "");

    let log_path = env.catalog.layout().log_path(UnitKind::Pipeline, "build");
    let raw = fs::read_to_string(&log_path)?;
    assert_eq!(raw.matches(END_MARKER).count(), 1);
    assert_eq!(logcodec::read_log(&log_path)?, vec![record.clone()]);

    let entry = env
        .catalog
        .ledger()
        .unit("pipelines", "build")?
        .ok_or("ledger entry missing")?;
    assert_eq!(entry.status, UnitStatus::Success);
    assert_eq!(entry.executions, vec![record]);
    assert!(env.catalog.engine().registry().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn output_without_trailing_newline_agrees_across_handle_ledger_and_log() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("terse", "printf hi").build())?;

    let record = with_timeout(env.catalog.run(UnitKind::Pipeline, "terse")?.wait()).await?;
    assert_eq!(record.output, "hi\n");

    let entry = env
        .catalog
        .ledger()
        .unit("pipelines", "terse")?
        .ok_or("ledger entry missing")?;
    let logged = env
        .catalog
        .latest_execution(UnitKind::Pipeline, "terse")?
        .ok_or("log entry missing")?;
    assert_eq!(entry.executions, vec![record.clone()]);
    assert_eq!(logged, record);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_exit_marks_unit_failed_with_stderr_in_error() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog.create(
        UnitKind::Pipeline,
        &UnitBuilder::new("broken", "echo partial\necho oops >&2\nexit 3\n").build(),
    )?;

    let record = with_timeout(env.catalog.run(UnitKind::Pipeline, "broken")?.wait()).await?;

    assert_eq!(record.status, ExecutionStatus::Error);
    assert_eq!(record.output, "");
    assert_eq!(record.error, "partial\noops\n");
    assert_eq!(
        status_of(&env, UnitKind::Pipeline, "broken"),
        Some(UnitStatus::Failed)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_kills_a_looping_unit_and_records_a_failure() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("loop", "sleep 30\n").build())?;

    let handle = env.catalog.run(UnitKind::Pipeline, "loop")?;
    assert!(env.catalog.engine().is_running(UnitKind::Pipeline, "loop"));
    assert_eq!(
        status_of(&env, UnitKind::Pipeline, "loop"),
        Some(UnitStatus::Running)
    );

    env.catalog.stop(UnitKind::Pipeline, "loop")?;
    assert!(!env.catalog.engine().is_running(UnitKind::Pipeline, "loop"));

    let record = with_timeout(handle.wait()).await?;
    assert_eq!(record.status, ExecutionStatus::Error);

    let status = status_of(&env, UnitKind::Pipeline, "loop");
    assert!(matches!(status, Some(s) if s != UnitStatus::Running));
    assert!(env.catalog.engine().registry().is_empty());
    assert_eq!(env.catalog.history(UnitKind::Pipeline, "loop")?.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_also_reaches_background_children() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog.create(
        UnitKind::Pipeline,
        &UnitBuilder::new("forks", "sleep 30 &\nwait\n").build(),
    )?;

    let handle = env.catalog.run(UnitKind::Pipeline, "forks")?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    env.catalog.stop(UnitKind::Pipeline, "forks")?;

    // The grandchild holds the pipes; the run still has to finish promptly.
    let record = with_timeout(handle.wait()).await?;
    assert_eq!(record.status, ExecutionStatus::Error);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_run_of_the_same_unit_is_rejected() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("slow", "sleep 30\n").build())?;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let catalog = env.catalog.clone();
            tokio::spawn(async move { catalog.run(UnitKind::Pipeline, "slow") })
        })
        .collect();

    let mut handles = Vec::new();
    let mut rejected = 0;
    for attempt in attempts {
        match attempt.await? {
            Ok(handle) => handles.push(handle),
            Err(RunledgerError::AlreadyRunning(_)) => rejected += 1,
            Err(e) => return Err(e.into()),
        }
    }

    assert_eq!(handles.len(), 1);
    assert_eq!(rejected, 7);
    assert_eq!(env.catalog.engine().registry().len(), 1);

    env.catalog.stop(UnitKind::Pipeline, "slow")?;
    for handle in handles {
        with_timeout(handle.wait()).await?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_kills_even_when_the_ledger_is_unreadable() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("stuck", "sleep 30\n").build())?;

    let handle = env.catalog.run(UnitKind::Pipeline, "stuck")?;
    fs::write(env.catalog.layout().ledger_path(), "{not json")?;

    let err = env.catalog.stop(UnitKind::Pipeline, "stuck").unwrap_err();
    assert!(matches!(err, RunledgerError::LedgerParse { .. }));
    assert!(!env.catalog.engine().is_running(UnitKind::Pipeline, "stuck"));

    // Killed well before `sleep 30` would have returned.
    let record = with_timeout(handle.wait()).await?;
    assert_eq!(record.status, ExecutionStatus::Error);
    assert!(env.catalog.engine().registry().is_empty());

    // The log still has the run; the ledger is left as it was found.
    assert_eq!(env.catalog.history(UnitKind::Pipeline, "stuck")?.len(), 1);
    assert_eq!(
        fs::read_to_string(env.catalog.layout().ledger_path())?,
        "{not json"
    );
    Ok(())
}

#[tokio::test]
async fn completion_runs_on_a_single_threaded_runtime() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Function, &UnitBuilder::new("single", "echo one\n").build())?;

    let record = with_timeout(env.catalog.run(UnitKind::Function, "single")?.wait()).await?;

    assert_eq!(record.output, "one\n");
    assert_eq!(
        status_of(&env, UnitKind::Function, "single"),
        Some(UnitStatus::Success)
    );
    Ok(())
}

#[tokio::test]
async fn stopping_an_idle_unit_is_not_running_and_leaves_ledger_alone() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("idle", "true\n").build())?;
    let ledger_path = env.catalog.layout().ledger_path();
    let before = fs::read_to_string(&ledger_path)?;

    let err = env.catalog.stop(UnitKind::Pipeline, "idle").unwrap_err();

    assert!(matches!(err, RunledgerError::NotRunning(_)));
    assert_eq!(fs::read_to_string(&ledger_path)?, before);
    Ok(())
}

#[tokio::test]
async fn running_an_unknown_unit_is_not_found() -> TestResult {
    init_tracing();
    let env = TestEnv::new();

    let err = env.catalog.run(UnitKind::Function, "ghost").unwrap_err();

    assert!(matches!(err, RunledgerError::UnitNotFound { .. }));
    assert!(env.catalog.engine().registry().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_interpreter_is_recorded_as_failed_run() -> TestResult {
    init_tracing();
    let mut raw = RawConfigFile::default();
    raw.runtimes
        .insert("shell".to_string(), "/nonexistent/runledger-sh".to_string());
    let env = TestEnv::with_config(ConfigFile::try_from(raw)?);
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("nosh", "echo hi\n").build())?;

    let record = with_timeout(env.catalog.run(UnitKind::Pipeline, "nosh")?.wait()).await?;

    assert_eq!(record.status, ExecutionStatus::Error);
    assert!(record.error.contains("/nonexistent/runledger-sh"));
    assert_eq!(
        status_of(&env, UnitKind::Pipeline, "nosh"),
        Some(UnitStatus::Failed)
    );
    assert!(env.catalog.engine().registry().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ledger_history_is_capped_while_the_log_keeps_everything() -> TestResult {
    init_tracing();
    let mut raw = RawConfigFile::default();
    raw.history.limit = 2;
    let env = TestEnv::with_config(ConfigFile::try_from(raw)?);
    env.catalog
        .create(UnitKind::Function, &UnitBuilder::new("tick", "echo tick\n").build())?;

    for _ in 0..3 {
        with_timeout(env.catalog.run(UnitKind::Function, "tick")?.wait()).await?;
    }

    let entry = env
        .catalog
        .ledger()
        .unit("functions", "tick")?
        .ok_or("ledger entry missing")?;
    assert_eq!(entry.executions.len(), 2);
    assert_eq!(env.catalog.history(UnitKind::Function, "tick")?.len(), 3);
    assert_eq!(
        env.catalog.latest_execution(UnitKind::Function, "tick")?,
        entry.executions.last().cloned()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unit_can_run_again_after_being_stopped() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    env.catalog
        .create(UnitKind::Pipeline, &UnitBuilder::new("again", "sleep 30\n").build())?;

    let first = env.catalog.run(UnitKind::Pipeline, "again")?;
    env.catalog.stop(UnitKind::Pipeline, "again")?;
    let second = env.catalog.run(UnitKind::Pipeline, "again")?;
    assert_ne!(first.run_id, second.run_id);

    // The first run's completion must not release the second run's slot.
    with_timeout(first.wait()).await?;
    assert!(env.catalog.engine().is_running(UnitKind::Pipeline, "again"));
    assert_eq!(
        status_of(&env, UnitKind::Pipeline, "again"),
        Some(UnitStatus::Running)
    );

    env.catalog.stop(UnitKind::Pipeline, "again")?;
    with_timeout(second.wait()).await?;
    assert!(
        wait_until(Duration::from_secs(2), || {
            status_of(&env, UnitKind::Pipeline, "again") != Some(UnitStatus::Running)
        })
        .await
    );
    Ok(())
}
