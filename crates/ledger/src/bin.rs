use depotrack_core::{StockError, StockResult};

use crate::movement::{MovementDraft, PairKey};

/// One (product, location) stock bin, rehydrated from the store.
///
/// Decision logic follows the aggregate split:
/// - **decide**: [`receive`](Self::receive) / [`issue`](Self::issue) return
///   drafts without mutating state;
/// - **evolve**: [`apply`](Self::apply) folds a committed delta into the
///   in-memory quantity.
///
/// `version` counts committed movements for the pair and backs the store's
/// optimistic concurrency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockBin {
    key: PairKey,
    quantity: i64,
    version: u64,
}

impl StockBin {
    /// A bin with no history (no stock item row exists yet).
    pub fn empty(key: PairKey) -> Self {
        Self {
            key,
            quantity: 0,
            version: 0,
        }
    }

    /// Rehydrate from stored state.
    pub fn rehydrate(key: PairKey, quantity: i64, version: u64) -> Self {
        Self {
            key,
            quantity,
            version,
        }
    }

    pub fn key(&self) -> PairKey {
        self.key
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Decide an inbound movement.
    pub fn receive(&self, quantity: i64) -> StockResult<MovementDraft> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }
        Ok(MovementDraft {
            product_id: self.key.product_id,
            location_id: self.key.location_id,
            quantity,
        })
    }

    /// Decide an outbound movement.
    ///
    /// The requested amount must not exceed the on-hand quantity; the store
    /// re-checks this under its commit lock, so a stale bin surfaces as a
    /// concurrency conflict rather than negative stock.
    pub fn issue(&self, quantity: i64) -> StockResult<MovementDraft> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }
        if quantity > self.quantity {
            return Err(StockError::InsufficientStock {
                on_hand: self.quantity,
                requested: quantity,
            });
        }
        Ok(MovementDraft {
            product_id: self.key.product_id,
            location_id: self.key.location_id,
            quantity: -quantity,
        })
    }

    /// Fold a committed delta into the bin.
    pub fn apply(&mut self, delta: i64) {
        self.quantity += delta;
        self.version += 1;
    }
}

/// Decide both legs of a transfer: debit at the source, credit at the
/// destination, in that order.
///
/// The drafts must be committed together or not at all; no reader may ever
/// observe the debit without the credit.
pub fn plan_transfer(
    source: &StockBin,
    destination: &StockBin,
    quantity: i64,
) -> StockResult<[MovementDraft; 2]> {
    if source.key().product_id != destination.key().product_id {
        return Err(StockError::validation(
            "transfer bins must hold the same product",
        ));
    }
    if source.key().location_id == destination.key().location_id {
        return Err(StockError::invalid_transfer(
            "source and destination location are the same",
        ));
    }
    let debit = source.issue(quantity)?;
    let credit = destination.receive(quantity)?;
    Ok([debit, credit])
}
