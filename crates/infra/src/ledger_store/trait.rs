use std::sync::Arc;

use thiserror::Error;

use depotrack_core::{LocationId, ProductId, UserId};
use depotrack_ledger::{MovementDraft, PairKey, StockItem, StockMovement};

/// Stored state of one stock bin.
///
/// `version` counts committed movements for the pair and backs the optimistic
/// concurrency check: a decision made against version N only commits while the
/// pair is still at version N.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct BinState {
    pub quantity: i64,
    pub version: u64,
}

/// Which ledger rows to retire along with catalog entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetireScope {
    Products(Vec<ProductId>),
    Locations(Vec<LocationId>),
}

/// Ledger store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, insufficient stock). The stock service maps
/// them into the domain taxonomy at its boundary.
#[derive(Debug, Error)]
pub enum LedgerStoreError {
    /// A touched pair moved since the caller's decision was made.
    /// Safe to retry the whole operation.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Malformed batch (missing expectation, would drive a quantity negative).
    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    /// Underlying storage failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Append-only movement log plus its materialized stock-item view.
///
/// ## Commit semantics
///
/// `commit()`:
/// - verifies an expectation is supplied for every pair the batch touches
/// - checks every expectation against the stored pair version
/// - assigns movement ids, commit timestamps and globally monotonic sequence
///   numbers
/// - folds the deltas into the stock-item view, refusing any batch that would
///   drive a quantity below zero
/// - applies **all of the batch or none of it**; both legs of a transfer land
///   together
///
/// ## Uniqueness
///
/// Implementations key the stock-item view by `(product_id, location_id)`, so
/// a second row for a pair is unrepresentable. Rows are retained at quantity
/// zero.
///
/// ## Retire semantics
///
/// `retire()` removes movements first, then items, atomically; the caller
/// removes the catalog row afterwards.
pub trait LedgerStore: Send + Sync {
    fn commit(
        &self,
        actor: UserId,
        drafts: Vec<MovementDraft>,
        expectations: &[(PairKey, u64)],
    ) -> Result<Vec<StockMovement>, LedgerStoreError>;

    /// Current state of a pair; zero state if no item row exists yet.
    fn bin(&self, key: PairKey) -> Result<BinState, LedgerStoreError>;

    fn item(&self, key: PairKey) -> Result<Option<StockItem>, LedgerStoreError>;

    /// All stock-item rows, including zero-quantity ones.
    fn items(&self) -> Result<Vec<StockItem>, LedgerStoreError>;

    fn items_for_product(&self, product_id: ProductId) -> Result<Vec<StockItem>, LedgerStoreError>;

    /// The full movement log in sequence order.
    fn movements(&self) -> Result<Vec<StockMovement>, LedgerStoreError>;

    fn retire(&self, scope: &RetireScope) -> Result<(), LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn commit(
        &self,
        actor: UserId,
        drafts: Vec<MovementDraft>,
        expectations: &[(PairKey, u64)],
    ) -> Result<Vec<StockMovement>, LedgerStoreError> {
        (**self).commit(actor, drafts, expectations)
    }

    fn bin(&self, key: PairKey) -> Result<BinState, LedgerStoreError> {
        (**self).bin(key)
    }

    fn item(&self, key: PairKey) -> Result<Option<StockItem>, LedgerStoreError> {
        (**self).item(key)
    }

    fn items(&self) -> Result<Vec<StockItem>, LedgerStoreError> {
        (**self).items()
    }

    fn items_for_product(&self, product_id: ProductId) -> Result<Vec<StockItem>, LedgerStoreError> {
        (**self).items_for_product(product_id)
    }

    fn movements(&self) -> Result<Vec<StockMovement>, LedgerStoreError> {
        (**self).movements()
    }

    fn retire(&self, scope: &RetireScope) -> Result<(), LedgerStoreError> {
        (**self).retire(scope)
    }
}
