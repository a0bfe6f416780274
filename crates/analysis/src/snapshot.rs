use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use depotrack_core::{LocationId, ProductId};

/// One movement fact as seen by the analysis pass.
///
/// This is a projection of the ledger's movement row: enough to compute
/// velocities and activity counts, nothing more. Keeping a separate type here
/// keeps the analysis crate decoupled from ledger internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Consistent input for one analysis run.
///
/// `products` and `locations` enumerate every catalog entity, so entities
/// without any movements still get an analysis row. `movements` is the full
/// surviving movement log as of the snapshot instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub products: Vec<ProductId>,
    pub locations: Vec<LocationId>,
    pub movements: Vec<MovementRecord>,
}

/// Source of analysis snapshots (implemented over the catalog + ledger stores).
pub trait SnapshotReader: Send + Sync {
    fn snapshot(&self) -> Result<AnalysisSnapshot, AnalysisError>;
}

/// Analysis pass failure, tagged with the phase it occurred in.
///
/// A failure in any phase aborts the whole run; partial analysis data is
/// worse than a full retry on the next cycle.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid analysis parameters: {0}")]
    InvalidParams(String),

    #[error("snapshot phase failed: {0}")]
    Snapshot(String),

    #[error("store phase failed: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}
