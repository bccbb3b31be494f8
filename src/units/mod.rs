// src/units/mod.rs

//! Caller-facing unit operations: create/update/delete/list units, run and
//! stop them, and read their execution history.

pub mod catalog;
pub mod model;

pub use catalog::Catalog;
pub use model::{UnitDefinition, UnitDetail, UnitSummary, ValidUnit};
