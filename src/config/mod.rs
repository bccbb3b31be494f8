// src/config/mod.rs

//! Configuration loading and validation for runledger.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the raw config and resolve interpreter overrides (`validate.rs`).
//! - Resolve the on-disk layout of ledger, sources and logs (`layout.rs`).

pub mod layout;
pub mod loader;
pub mod model;
pub mod validate;

pub use layout::Layout;
pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, HistorySection, PathsSection, RawConfigFile, SchedulerSection};
