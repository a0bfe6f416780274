use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depotrack_core::{LocationId, MovementId, ProductId, UserId};

/// Key of one stock bin: a (product, location) pair.
///
/// At most one [`StockItem`] exists per key; stores enforce this by keying
/// their item table on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub product_id: ProductId,
    pub location_id: LocationId,
}

impl PairKey {
    pub fn new(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id,
            location_id,
        }
    }
}

/// A decided but uncommitted quantity delta.
///
/// Drafts carry no identifier, timestamp or log position; the store assigns
/// those during commit. Positive = inbound, negative = outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
}

impl MovementDraft {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.product_id, self.location_id)
    }
}

/// An immutable ledger fact: one committed quantity delta.
///
/// Movements are never updated or deleted after commit, except when retired
/// together with their product or location. `sequence` is store-assigned and
/// globally monotonic, giving the log a total order independent of wall-clock
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub user_id: UserId,
    pub recorded_at: DateTime<Utc>,
    pub sequence: u64,
}

impl StockMovement {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.product_id, self.location_id)
    }

    /// Inbound movement (stock placed into a location).
    pub fn is_inbound(&self) -> bool {
        self.quantity > 0
    }

    /// Outbound movement (stock picked from a location).
    pub fn is_outbound(&self) -> bool {
        self.quantity < 0
    }
}

/// Materialized view row: current quantity of one product at one location.
///
/// Always equal to the sum of the matching movement deltas, never negative.
/// Rows are retained at quantity zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
}

impl StockItem {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.product_id, self.location_id)
    }
}
