//! Stock operation pipeline (application-level orchestration).
//!
//! Every mutating operation follows the same shape:
//!
//! ```text
//! Request
//!   ↓
//! 1. Resolve/validate catalog references (product, location exist)
//!   ↓
//! 2. Rehydrate the touched stock bins from the store
//!   ↓
//! 3. Decide movement drafts (pure domain logic, no mutation)
//!   ↓
//! 4. Commit the batch atomically (optimistic per-pair version check)
//! ```
//!
//! A failure at any step leaves no partial state change: decisions are pure
//! and the store applies a batch all-or-nothing. `ConcurrencyConflict` is
//! surfaced to the caller, which is expected to retry a bounded number of
//! times with backoff.

use tracing::instrument;

use depotrack_catalog::CatalogStore;
use depotrack_core::{LocationId, ProductId, StockError, StockResult, UserId};
use depotrack_ledger::{PairKey, StockBin, StockItem, StockMovement, plan_transfer};

use crate::ledger_store::{LedgerStore, LedgerStoreError, RetireScope};

impl From<LedgerStoreError> for StockError {
    fn from(value: LedgerStoreError) -> Self {
        match value {
            LedgerStoreError::Concurrency(msg) => StockError::ConcurrencyConflict(msg),
            LedgerStoreError::InvalidCommit(msg) => StockError::Internal(msg),
            LedgerStoreError::Storage(msg) => StockError::Internal(msg),
        }
    }
}

/// Location occupancy summary (how full the warehouse is).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OccupancySummary {
    pub total_locations: usize,
    pub occupied_locations: usize,
    pub empty_locations: usize,
    /// Percentage of locations holding stock, rounded to two decimals.
    pub fill_rate_percent: f64,
}

/// The stock ledger service: owns all quantity mutations.
///
/// No other component mutates StockItem or StockMovement rows; collaborators
/// (web surface, import, catalog management) call these operations with
/// already-resolved identifiers and an authenticated actor id.
#[derive(Debug)]
pub struct StockLedger<C, L> {
    catalog: C,
    store: L,
}

impl<C, L> StockLedger<C, L> {
    pub fn new(catalog: C, store: L) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn store(&self) -> &L {
        &self.store
    }
}

impl<C, L> StockLedger<C, L>
where
    C: CatalogStore,
    L: LedgerStore,
{
    fn ensure_product(&self, product_id: ProductId) -> StockResult<()> {
        if self.catalog.product_exists(product_id) {
            Ok(())
        } else {
            Err(StockError::not_found())
        }
    }

    fn ensure_location(&self, location_id: LocationId) -> StockResult<()> {
        if self.catalog.location_exists(location_id) {
            Ok(())
        } else {
            Err(StockError::not_found())
        }
    }

    fn load_bin(&self, key: PairKey) -> StockResult<StockBin> {
        let state = self.store.bin(key)?;
        Ok(StockBin::rehydrate(key, state.quantity, state.version))
    }

    /// Place stock into a location.
    #[instrument(skip(self), fields(%product_id, %location_id, quantity), err)]
    pub fn add_stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        actor: UserId,
    ) -> StockResult<StockMovement> {
        self.ensure_product(product_id)?;
        self.ensure_location(location_id)?;

        let bin = self.load_bin(PairKey::new(product_id, location_id))?;
        let draft = bin.receive(quantity)?;

        let mut committed = self
            .store
            .commit(actor, vec![draft], &[(bin.key(), bin.version())])?;
        Ok(committed.remove(0))
    }

    /// Pick stock from a location.
    #[instrument(skip(self), fields(%product_id, %location_id, quantity), err)]
    pub fn remove_stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        actor: UserId,
    ) -> StockResult<StockMovement> {
        self.ensure_product(product_id)?;
        self.ensure_location(location_id)?;

        let bin = self.load_bin(PairKey::new(product_id, location_id))?;
        let draft = bin.issue(quantity)?;

        let mut committed = self
            .store
            .commit(actor, vec![draft], &[(bin.key(), bin.version())])?;
        Ok(committed.remove(0))
    }

    /// Move stock between two locations: debit the source, credit the
    /// destination, committed together or not at all. Returns the two
    /// movement rows in that order.
    #[instrument(
        skip(self),
        fields(%product_id, %from_location_id, %to_location_id, quantity),
        err
    )]
    pub fn transfer_stock(
        &self,
        product_id: ProductId,
        from_location_id: LocationId,
        to_location_id: LocationId,
        quantity: i64,
        actor: UserId,
    ) -> StockResult<(StockMovement, StockMovement)> {
        if from_location_id == to_location_id {
            return Err(StockError::invalid_transfer(
                "source and destination location are the same",
            ));
        }
        self.ensure_product(product_id)?;
        self.ensure_location(from_location_id)?;
        self.ensure_location(to_location_id)?;

        let source = self.load_bin(PairKey::new(product_id, from_location_id))?;
        let destination = self.load_bin(PairKey::new(product_id, to_location_id))?;
        let [debit, credit] = plan_transfer(&source, &destination, quantity)?;

        let mut committed = self.store.commit(
            actor,
            vec![debit, credit],
            &[
                (source.key(), source.version()),
                (destination.key(), destination.version()),
            ],
        )?;
        let second = committed.remove(1);
        let first = committed.remove(0);
        Ok((first, second))
    }

    /// Retire all ledger rows referencing the given entities: movements
    /// first, then items. The catalog rows themselves are untouched.
    #[instrument(skip(self), err)]
    pub fn bulk_retire(&self, scope: RetireScope) -> StockResult<()> {
        match &scope {
            RetireScope::Products(ids) => {
                for id in ids {
                    self.ensure_product(*id)?;
                }
            }
            RetireScope::Locations(ids) => {
                for id in ids {
                    self.ensure_location(*id)?;
                }
            }
        }
        self.store.retire(&scope)?;
        Ok(())
    }

    /// Delete products with their full ledger history: movements, then
    /// items, then the catalog rows.
    #[instrument(skip(self), err)]
    pub fn delete_products(&self, ids: &[ProductId]) -> StockResult<()> {
        for id in ids {
            self.ensure_product(*id)?;
        }
        self.store.retire(&RetireScope::Products(ids.to_vec()))?;
        self.catalog.remove_products(ids)
    }

    /// Delete locations with their full ledger history.
    #[instrument(skip(self), err)]
    pub fn delete_locations(&self, ids: &[LocationId]) -> StockResult<()> {
        for id in ids {
            self.ensure_location(*id)?;
        }
        self.store.retire(&RetireScope::Locations(ids.to_vec()))?;
        self.catalog.remove_locations(ids)
    }

    /// Current quantity of one product at one location.
    pub fn on_hand(&self, product_id: ProductId, location_id: LocationId) -> StockResult<i64> {
        Ok(self.store.bin(PairKey::new(product_id, location_id))?.quantity)
    }

    /// Current quantity of a product summed across all locations.
    pub fn total_quantity(&self, product_id: ProductId) -> StockResult<i64> {
        Ok(self
            .store
            .items_for_product(product_id)?
            .iter()
            .map(|i| i.quantity)
            .sum())
    }

    /// All non-empty stock items.
    pub fn stock_overview(&self) -> StockResult<Vec<StockItem>> {
        Ok(self
            .store
            .items()?
            .into_iter()
            .filter(|i| i.quantity > 0)
            .collect())
    }

    /// Movement history, newest first.
    pub fn movement_history(&self) -> StockResult<Vec<StockMovement>> {
        let mut movements = self.store.movements()?;
        movements.sort_by_key(|m| std::cmp::Reverse(m.sequence));
        Ok(movements)
    }

    /// Locations currently holding no stock.
    pub fn empty_locations(&self) -> StockResult<Vec<LocationId>> {
        let occupied: std::collections::HashSet<LocationId> = self
            .store
            .items()?
            .into_iter()
            .filter(|i| i.quantity > 0)
            .map(|i| i.location_id)
            .collect();

        Ok(self
            .catalog
            .locations()
            .into_iter()
            .map(|l| l.id())
            .filter(|id| !occupied.contains(id))
            .collect())
    }

    /// Warehouse occupancy: how many locations hold stock.
    pub fn occupancy(&self) -> StockResult<OccupancySummary> {
        let total_locations = self.catalog.locations().len();
        let occupied: std::collections::HashSet<LocationId> = self
            .store
            .items()?
            .into_iter()
            .filter(|i| i.quantity > 0)
            .map(|i| i.location_id)
            .collect();
        let occupied_locations = occupied.len();

        let fill_rate_percent = if total_locations > 0 {
            let rate = occupied_locations as f64 / total_locations as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };

        Ok(OccupancySummary {
            total_locations,
            occupied_locations,
            empty_locations: total_locations - occupied_locations,
            fill_rate_percent,
        })
    }
}
