//! `depotrack-analysis`
//!
//! **Responsibility:** the scheduled strategic-analysis pass.
//!
//! This crate is intentionally **pure**:
//! - It must not mutate ledger state; it reads a movement snapshot and emits
//!   analysis rows.
//! - Given the same snapshot, the same `now` and the same parameters it
//!   produces identical output, so reruns are idempotent.
//! - Inputs are provided by callers (infra assembles the snapshot).

pub mod job;
pub mod report;
pub mod snapshot;

pub use job::{AnalysisParams, StrategicAnalysisJob};
pub use report::{
    AnalysisReport, LocationActivityStatus, LocationAnalysis, NO_OUTFLOW_DAYS_OF_SUPPLY,
    ProductAnalysis, ProductStockStatus,
};
pub use snapshot::{AnalysisError, AnalysisSnapshot, MovementRecord, SnapshotReader};
