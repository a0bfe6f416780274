use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use depotrack_core::{MovementId, ProductId, UserId};
use depotrack_ledger::{MovementDraft, PairKey, StockItem, StockMovement};

use crate::clock::{Clock, SystemClock};

use super::r#trait::{BinState, LedgerStore, LedgerStoreError, RetireScope};

#[derive(Debug, Default)]
struct Inner {
    movements: Vec<StockMovement>,
    items: HashMap<PairKey, i64>,
    versions: HashMap<PairKey, u64>,
    next_sequence: u64,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single `RwLock` serializes commits, so the
/// read-check-write of every touched pair is atomic with respect to other
/// writers; readers on disjoint pairs proceed in parallel.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use an injected clock so commit timestamps are deterministic in tests.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, LedgerStoreError> {
        self.inner
            .read()
            .map_err(|_| LedgerStoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, LedgerStoreError> {
        self.inner
            .write()
            .map_err(|_| LedgerStoreError::Storage("lock poisoned".to_string()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn commit(
        &self,
        actor: UserId,
        drafts: Vec<MovementDraft>,
        expectations: &[(PairKey, u64)],
    ) -> Result<Vec<StockMovement>, LedgerStoreError> {
        if drafts.is_empty() {
            return Ok(vec![]);
        }

        let expected: HashMap<PairKey, u64> = expectations.iter().copied().collect();
        for (idx, draft) in drafts.iter().enumerate() {
            if !expected.contains_key(&draft.key()) {
                return Err(LedgerStoreError::InvalidCommit(format!(
                    "no expectation supplied for pair at index {idx}"
                )));
            }
        }

        let mut inner = self.write()?;

        // Check every expectation before touching anything.
        for (key, expected_version) in &expected {
            let current = inner.versions.get(key).copied().unwrap_or(0);
            if current != *expected_version {
                return Err(LedgerStoreError::Concurrency(format!(
                    "pair version expected {expected_version}, found {current}"
                )));
            }
        }

        // Dry-run the deltas; refuse the whole batch if any pair would go
        // negative.
        let mut resulting: HashMap<PairKey, i64> = HashMap::new();
        for draft in &drafts {
            let key = draft.key();
            let current = resulting
                .get(&key)
                .copied()
                .unwrap_or_else(|| inner.items.get(&key).copied().unwrap_or(0));
            let next = current + draft.quantity;
            if next < 0 {
                return Err(LedgerStoreError::InvalidCommit(format!(
                    "batch would drive pair quantity to {next}"
                )));
            }
            resulting.insert(key, next);
        }

        // Stamp and append, then fold into the view.
        let recorded_at = self.clock.now();
        let mut committed = Vec::with_capacity(drafts.len());
        for draft in drafts {
            inner.next_sequence += 1;
            let sequence = inner.next_sequence;
            let movement = StockMovement {
                id: MovementId::new(),
                product_id: draft.product_id,
                location_id: draft.location_id,
                quantity: draft.quantity,
                user_id: actor,
                recorded_at,
                sequence,
            };
            let key = movement.key();
            *inner.items.entry(key).or_insert(0) += movement.quantity;
            *inner.versions.entry(key).or_insert(0) += 1;
            inner.movements.push(movement.clone());
            committed.push(movement);
        }

        Ok(committed)
    }

    fn bin(&self, key: PairKey) -> Result<BinState, LedgerStoreError> {
        let inner = self.read()?;
        Ok(BinState {
            quantity: inner.items.get(&key).copied().unwrap_or(0),
            version: inner.versions.get(&key).copied().unwrap_or(0),
        })
    }

    fn item(&self, key: PairKey) -> Result<Option<StockItem>, LedgerStoreError> {
        let inner = self.read()?;
        Ok(inner.items.get(&key).map(|&quantity| StockItem {
            product_id: key.product_id,
            location_id: key.location_id,
            quantity,
        }))
    }

    fn items(&self) -> Result<Vec<StockItem>, LedgerStoreError> {
        let inner = self.read()?;
        let mut items: Vec<StockItem> = inner
            .items
            .iter()
            .map(|(key, &quantity)| StockItem {
                product_id: key.product_id,
                location_id: key.location_id,
                quantity,
            })
            .collect();
        items.sort_by_key(|i| i.key());
        Ok(items)
    }

    fn items_for_product(&self, product_id: ProductId) -> Result<Vec<StockItem>, LedgerStoreError> {
        Ok(self
            .items()?
            .into_iter()
            .filter(|i| i.product_id == product_id)
            .collect())
    }

    fn movements(&self) -> Result<Vec<StockMovement>, LedgerStoreError> {
        let inner = self.read()?;
        Ok(inner.movements.clone())
    }

    fn retire(&self, scope: &RetireScope) -> Result<(), LedgerStoreError> {
        let mut inner = self.write()?;
        // Movements first, then items; one lock makes the pair removal atomic.
        match scope {
            RetireScope::Products(ids) => {
                inner.movements.retain(|m| !ids.contains(&m.product_id));
                inner.items.retain(|key, _| !ids.contains(&key.product_id));
                inner
                    .versions
                    .retain(|key, _| !ids.contains(&key.product_id));
            }
            RetireScope::Locations(ids) => {
                inner.movements.retain(|m| !ids.contains(&m.location_id));
                inner.items.retain(|key, _| !ids.contains(&key.location_id));
                inner
                    .versions
                    .retain(|key, _| !ids.contains(&key.location_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depotrack_core::LocationId;

    fn draft(key: PairKey, quantity: i64) -> MovementDraft {
        MovementDraft {
            product_id: key.product_id,
            location_id: key.location_id,
            quantity,
        }
    }

    #[test]
    fn commit_assigns_monotonic_sequence_numbers() {
        let store = InMemoryLedgerStore::new();
        let key = PairKey::new(ProductId::new(), LocationId::new());
        let actor = UserId::new();

        let first = store
            .commit(actor, vec![draft(key, 10)], &[(key, 0)])
            .unwrap();
        let second = store
            .commit(actor, vec![draft(key, 5)], &[(key, 1)])
            .unwrap();

        assert_eq!(first[0].sequence, 1);
        assert_eq!(second[0].sequence, 2);
        assert_eq!(store.bin(key).unwrap().quantity, 15);
        assert_eq!(store.bin(key).unwrap().version, 2);
    }

    #[test]
    fn stale_expectation_is_a_concurrency_error() {
        let store = InMemoryLedgerStore::new();
        let key = PairKey::new(ProductId::new(), LocationId::new());
        let actor = UserId::new();

        store
            .commit(actor, vec![draft(key, 10)], &[(key, 0)])
            .unwrap();
        let err = store
            .commit(actor, vec![draft(key, -5)], &[(key, 0)])
            .unwrap_err();

        assert!(matches!(err, LedgerStoreError::Concurrency(_)));
        assert_eq!(store.bin(key).unwrap().quantity, 10);
        assert_eq!(store.movements().unwrap().len(), 1);
    }

    #[test]
    fn failed_batch_leaves_no_trace_on_any_pair() {
        let store = InMemoryLedgerStore::new();
        let product = ProductId::new();
        let source = PairKey::new(product, LocationId::new());
        let destination = PairKey::new(product, LocationId::new());
        let actor = UserId::new();

        store
            .commit(actor, vec![draft(source, 3)], &[(source, 0)])
            .unwrap();

        // Both legs in one batch, but the destination expectation is stale:
        // the debit must not land either.
        let err = store
            .commit(
                actor,
                vec![draft(source, -3), draft(destination, 3)],
                &[(source, 1), (destination, 7)],
            )
            .unwrap_err();

        assert!(matches!(err, LedgerStoreError::Concurrency(_)));
        assert_eq!(store.bin(source).unwrap().quantity, 3);
        assert_eq!(store.bin(destination).unwrap().quantity, 0);
        assert_eq!(store.movements().unwrap().len(), 1);
    }

    #[test]
    fn batch_driving_quantity_negative_is_refused() {
        let store = InMemoryLedgerStore::new();
        let key = PairKey::new(ProductId::new(), LocationId::new());
        let actor = UserId::new();

        let err = store
            .commit(actor, vec![draft(key, -1)], &[(key, 0)])
            .unwrap_err();
        assert!(matches!(err, LedgerStoreError::InvalidCommit(_)));
        assert!(store.movements().unwrap().is_empty());
    }

    #[test]
    fn retire_removes_movements_and_items_for_the_product() {
        let store = InMemoryLedgerStore::new();
        let product = ProductId::new();
        let other = ProductId::new();
        let location = LocationId::new();
        let actor = UserId::new();

        let key = PairKey::new(product, location);
        let other_key = PairKey::new(other, location);
        store
            .commit(actor, vec![draft(key, 10)], &[(key, 0)])
            .unwrap();
        store
            .commit(actor, vec![draft(other_key, 4)], &[(other_key, 0)])
            .unwrap();

        store
            .retire(&RetireScope::Products(vec![product]))
            .unwrap();

        assert!(store.item(key).unwrap().is_none());
        assert_eq!(store.bin(other_key).unwrap().quantity, 4);
        assert!(
            store
                .movements()
                .unwrap()
                .iter()
                .all(|m| m.product_id == other)
        );
    }
}
