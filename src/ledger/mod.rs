// src/ledger/mod.rs

//! State ledger: service enablement and per-unit metadata.
//!
//! - [`model`] defines the serialized document.
//! - [`store`] owns the file and the lock every mutation goes through.

pub mod model;
pub mod store;

pub use model::{ExecutionRecord, ExecutionStatus, LedgerDocument, ServiceStatus, UnitEntry};
pub use store::Ledger;
