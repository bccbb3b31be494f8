// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod ledger;
pub mod logcodec;
pub mod logging;
pub mod naming;
pub mod schedule;
pub mod types;
pub mod units;

use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::{CliArgs, Command, DefineArgs};
use crate::config::load_or_default;
use crate::ledger::{ExecutionRecord, ExecutionStatus};
use crate::types::UnitKind;
use crate::units::{Catalog, UnitDefinition, UnitSummary};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, opens the catalog (ledger, scheduler backend, engine)
/// and dispatches one subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    let catalog = Catalog::open(cfg)?;
    debug!(root = ?catalog.layout().root(), "catalog opened");

    match args.command {
        Command::Create(def) => {
            let summary = catalog.create(def.unit.kind, &read_definition(&def)?)?;
            println!("created {} '{}'", summary.kind, summary.name);
        }
        Command::Update(def) => {
            let summary = catalog.update(def.unit.kind, &read_definition(&def)?)?;
            println!("updated {} '{}'", summary.kind, summary.name);
        }
        Command::Delete(unit) => {
            catalog.delete(unit.kind, &unit.name)?;
            println!("deleted {} '{}'", unit.kind, unit.name);
        }
        Command::List { kind } => {
            let enabled = catalog.service_enabled(kind)?;
            println!(
                "{} ({})",
                kind.service(),
                if enabled { "enabled" } else { "disabled" }
            );
            for summary in catalog.list(kind)? {
                print_summary(&summary);
            }
        }
        Command::Show(unit) => {
            let detail = catalog.show(unit.kind, &unit.name)?;
            print_summary(&detail.summary);
            if let Some(path) = &detail.source_path {
                println!("  source: {}", path.display());
            }
            println!("  log: {}", detail.log_path.display());
            println!();
            print!("{}", detail.source);
        }
        Command::Run(unit) => run_and_wait(&catalog, unit.kind, &unit.name).await?,
        Command::Logs { unit, all } => {
            let records = if all {
                catalog.history(unit.kind, &unit.name)?
            } else {
                catalog
                    .latest_execution(unit.kind, &unit.name)?
                    .into_iter()
                    .collect()
            };
            if records.is_empty() {
                println!("no executions recorded for {} '{}'", unit.kind, unit.name);
            }
            for record in &records {
                print_record(record);
            }
        }
        Command::Enable { kind } => {
            catalog.enable_service(kind)?;
            println!("{} enabled", kind.service());
        }
        Command::Disable { kind } => {
            catalog.disable_service(kind)?;
            println!("{} disabled", kind.service());
        }
    }

    Ok(())
}

/// Start a run, stop it on Ctrl-C, and print the recorded execution.
async fn run_and_wait(catalog: &Catalog, kind: UnitKind, name: &str) -> Result<()> {
    let handle = catalog.run(kind, name)?;
    info!(unit = %handle.unit_id, run_id = handle.run_id, "waiting for run");

    // Ctrl-C -> stop the unit; completion still records the failed run.
    let ctrl_c = {
        let engine = catalog.engine().clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            if let Err(e) = engine.stop(kind, &name) {
                debug!(error = %e, "stop on Ctrl+C");
            }
        })
    };

    let record = handle.wait().await;
    ctrl_c.abort();
    let record = record?;

    print_record(&record);
    if record.status == ExecutionStatus::Error {
        bail!("{kind} '{name}' failed");
    }
    Ok(())
}

fn read_definition(def: &DefineArgs) -> Result<UnitDefinition> {
    let source = match (&def.source, &def.file) {
        (Some(source), _) => source.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading source file {:?}", path))?,
        (None, None) => String::new(),
    };

    Ok(UnitDefinition {
        name: def.unit.name.clone(),
        runtime: def.runtime.clone(),
        source,
        cron: def.cron.clone(),
    })
}

fn print_summary(summary: &UnitSummary) {
    let trigger = match &summary.trigger {
        Some(types::Trigger::Cron(expr)) => format!("cron \"{expr}\""),
        None => "-".to_string(),
    };
    let mut flags = Vec::new();
    if !summary.source_present {
        flags.push("source missing");
    }
    if !summary.in_ledger {
        flags.push("not in ledger");
    }

    println!(
        "  {:<24} {:<8} {:<8} {}{}",
        summary.name,
        summary.runtime,
        summary.status,
        trigger,
        if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        }
    );
}

fn print_record(record: &ExecutionRecord) {
    println!("[{}] {}", record.timestamp, record.status);
    print!("{}", record.text());
}
