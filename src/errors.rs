// src/errors.rs

//! Crate-wide error type and the taxonomy the outer layers map it onto.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::UnitKind;

#[derive(Error, Debug)]
pub enum RunledgerError {
    #[error("Invalid unit name: {0:?}")]
    InvalidName(String),

    #[error("Source for unit '{0}' is empty")]
    EmptySource(String),

    #[error("Unsupported runtime '{runtime}' for {kind}")]
    UnsupportedRuntime { kind: UnitKind, runtime: String },

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("{kind} '{name}' not found")]
    UnitNotFound { kind: UnitKind, name: String },

    #[error("{kind} '{name}' already exists")]
    UnitExists { kind: UnitKind, name: String },

    #[error("Unit '{0}' is not running")]
    NotRunning(String),

    #[error("Unit '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Ledger at {path:?} is malformed: {source}")]
    LedgerParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Scheduler table error: {0}")]
    ScheduleError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification used by callers that need to map failures onto
/// their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any side effect.
    Validation,
    NotFound,
    Conflict,
    Io,
    Internal,
}

impl RunledgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunledgerError::InvalidName(_)
            | RunledgerError::EmptySource(_)
            | RunledgerError::UnsupportedRuntime { .. }
            | RunledgerError::InvalidTrigger(_)
            | RunledgerError::ConfigError(_)
            | RunledgerError::TomlError(_) => ErrorKind::Validation,
            RunledgerError::UnitNotFound { .. } | RunledgerError::NotRunning(_) => {
                ErrorKind::NotFound
            }
            RunledgerError::UnitExists { .. } | RunledgerError::AlreadyRunning(_) => {
                ErrorKind::Conflict
            }
            RunledgerError::LedgerParse { .. }
            | RunledgerError::IoError(_)
            | RunledgerError::ScheduleError(_) => ErrorKind::Io,
            RunledgerError::JsonError(_) | RunledgerError::Other(_) => ErrorKind::Internal,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunledgerError>;
