// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`registry`] holds the cancel handle of every running unit.
//! - [`process`] runs one unit's interpreter with `tokio::process::Command`
//!   and captures its output.

pub mod process;
pub mod registry;

pub use process::{ProcessOutcome, ProcessOutput, ProcessRequest, run_process};
pub use registry::{ProcessRegistry, Registration};
