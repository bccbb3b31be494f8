// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::types::UnitKind;

/// Command-line arguments for `runledger`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runledger",
    version,
    about = "Define, run and schedule pipelines and functions, and keep a ledger of their runs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Runledger.toml` in the current directory if it exists,
    /// built-in defaults otherwise.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RUNLEDGER_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Define a new unit.
    Create(DefineArgs),
    /// Replace an existing unit's source and metadata.
    Update(DefineArgs),
    /// Remove a unit, its scheduler line and its ledger entry.
    Delete(UnitRef),
    /// List units of a kind.
    List {
        #[arg(value_enum)]
        kind: UnitKind,
    },
    /// Show one unit with its source.
    Show(UnitRef),
    /// Run a unit and wait for it; Ctrl-C stops it.
    Run(UnitRef),
    /// Print the last execution, or all of them with `--all`.
    Logs {
        #[command(flatten)]
        unit: UnitRef,
        #[arg(long)]
        all: bool,
    },
    /// Mark a service as enabled in the ledger.
    Enable {
        #[arg(value_enum)]
        kind: UnitKind,
    },
    /// Mark a service as disabled in the ledger.
    Disable {
        #[arg(value_enum)]
        kind: UnitKind,
    },
}

#[derive(Debug, Clone, Args)]
pub struct UnitRef {
    #[arg(value_enum)]
    pub kind: UnitKind,
    pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct DefineArgs {
    #[command(flatten)]
    pub unit: UnitRef,

    /// Runtime (shell, bash, python, node). Defaults to shell.
    #[arg(long, default_value = "")]
    pub runtime: String,

    /// Source text.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub source: Option<String>,

    /// Read the source from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Cron expression (functions only).
    #[arg(long, value_name = "EXPR")]
    pub cron: Option<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
