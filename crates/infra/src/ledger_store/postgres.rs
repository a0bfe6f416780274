//! Postgres-backed ledger store implementation.
//!
//! Persists the movement log and the materialized stock-item view in one
//! database, keeping both in step inside a single transaction per commit.
//! Row-level locks on the touched `stock_items` rows serialize concurrent
//! writers on the same (product, location) pair; writers on disjoint pairs
//! proceed in parallel.
//!
//! ## Assumed schema
//!
//! ```sql
//! CREATE TABLE stock_movements (
//!     movement_id     uuid PRIMARY KEY,
//!     product_id      uuid NOT NULL,
//!     location_id     uuid NOT NULL,
//!     quantity        bigint NOT NULL,
//!     user_id         uuid NOT NULL,
//!     recorded_at     timestamptz NOT NULL DEFAULT now(),
//!     sequence_number bigserial
//! );
//!
//! CREATE TABLE stock_items (
//!     product_id  uuid NOT NULL,
//!     location_id uuid NOT NULL,
//!     quantity    bigint NOT NULL CHECK (quantity >= 0),
//!     version     bigint NOT NULL,
//!     UNIQUE (product_id, location_id)
//! );
//! ```
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `LedgerStoreError` as follows:
//!
//! | PostgreSQL Error Code | LedgerStoreError | Scenario |
//! |-----------------------|------------------|----------|
//! | `23505` (unique violation) | `Concurrency` | Concurrent writer landed on the pair first |
//! | `23514` (check violation) | `InvalidCommit` | Batch would drive a quantity negative |
//! | Any other | `Storage` | Connection failures, pool closed, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresLedgerStore` is `Send + Sync` and can be shared across threads.
//! All operations use the SQLx connection pool which handles thread-safe
//! connection management.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use depotrack_core::{LocationId, MovementId, ProductId, UserId};
use depotrack_ledger::{MovementDraft, PairKey, StockItem, StockMovement};

use super::r#trait::{BinState, LedgerStore, LedgerStoreError, RetireScope};

/// Postgres-backed ledger store.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Commit a draft batch atomically.
    ///
    /// Locks every touched pair row (`FOR UPDATE`, in stable key order to
    /// avoid lock cycles), validates the expectations, appends the movements
    /// and folds the deltas into the view, all in one transaction.
    #[instrument(skip(self, drafts, expectations), fields(batch_len = drafts.len()), err)]
    pub async fn commit_batch(
        &self,
        actor: UserId,
        drafts: Vec<MovementDraft>,
        expectations: &[(PairKey, u64)],
    ) -> Result<Vec<StockMovement>, LedgerStoreError> {
        if drafts.is_empty() {
            return Ok(vec![]);
        }

        let expected: HashMap<PairKey, u64> = expectations.iter().copied().collect();
        let touched: BTreeSet<PairKey> = drafts.iter().map(|d| d.key()).collect();
        for (idx, draft) in drafts.iter().enumerate() {
            if !expected.contains_key(&draft.key()) {
                return Err(LedgerStoreError::InvalidCommit(format!(
                    "no expectation supplied for pair at index {idx}"
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Lock and read every touched pair, in key order.
        let mut current: HashMap<PairKey, (i64, i64)> = HashMap::new();
        for key in &touched {
            let row = sqlx::query(
                r#"
                SELECT quantity, version
                FROM stock_items
                WHERE product_id = $1 AND location_id = $2
                FOR UPDATE
                "#,
            )
            .bind(key.product_id.as_uuid())
            .bind(key.location_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_stock_item", e))?;

            let state = match row {
                Some(row) => (
                    row.try_get::<i64, _>("quantity")
                        .map_err(|e| map_sqlx_error("read_stock_item", e))?,
                    row.try_get::<i64, _>("version")
                        .map_err(|e| map_sqlx_error("read_stock_item", e))?,
                ),
                None => (0, 0),
            };
            current.insert(*key, state);
        }

        // Validate every expectation before writing anything.
        for (key, expected_version) in &expected {
            let found = current.get(key).map(|(_, v)| *v).unwrap_or(0);
            if found != *expected_version as i64 {
                return Err(LedgerStoreError::Concurrency(format!(
                    "pair version expected {expected_version}, found {found}"
                )));
            }
        }

        // Dry-run the deltas; refuse the whole batch if any pair would go
        // negative (the CHECK constraint is the last line of defense).
        let mut resulting: HashMap<PairKey, (i64, i64)> = current.clone();
        for draft in &drafts {
            let entry = resulting.entry(draft.key()).or_insert((0, 0));
            entry.0 += draft.quantity;
            entry.1 += 1;
            if entry.0 < 0 {
                return Err(LedgerStoreError::InvalidCommit(format!(
                    "batch would drive pair quantity to {}",
                    entry.0
                )));
            }
        }

        // Append movements; the database assigns recorded_at and the log
        // position.
        let mut committed = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            let movement_id = MovementId::new();
            let row = sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    movement_id,
                    product_id,
                    location_id,
                    quantity,
                    user_id,
                    recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, now())
                RETURNING recorded_at, sequence_number
                "#,
            )
            .bind(movement_id.as_uuid())
            .bind(draft.product_id.as_uuid())
            .bind(draft.location_id.as_uuid())
            .bind(draft.quantity)
            .bind(actor.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;

            let recorded_at: DateTime<Utc> = row
                .try_get("recorded_at")
                .map_err(|e| map_sqlx_error("read_movement", e))?;
            let sequence: i64 = row
                .try_get("sequence_number")
                .map_err(|e| map_sqlx_error("read_movement", e))?;

            committed.push(StockMovement {
                id: movement_id,
                product_id: draft.product_id,
                location_id: draft.location_id,
                quantity: draft.quantity,
                user_id: actor,
                recorded_at,
                sequence: sequence as u64,
            });
        }

        // Fold the deltas into the view. Rows are already locked.
        for key in &touched {
            let (quantity, version) = resulting[key];
            sqlx::query(
                r#"
                INSERT INTO stock_items (product_id, location_id, quantity, version)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (product_id, location_id)
                DO UPDATE SET quantity = EXCLUDED.quantity, version = EXCLUDED.version
                "#,
            )
            .bind(key.product_id.as_uuid())
            .bind(key.location_id.as_uuid())
            .bind(quantity)
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_stock_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed)
    }

    #[instrument(skip(self), err)]
    pub async fn load_bin(&self, key: PairKey) -> Result<BinState, LedgerStoreError> {
        let row = sqlx::query(
            r#"
            SELECT quantity, version
            FROM stock_items
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(key.product_id.as_uuid())
        .bind(key.location_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_bin", e))?;

        match row {
            Some(row) => Ok(BinState {
                quantity: row
                    .try_get::<i64, _>("quantity")
                    .map_err(|e| map_sqlx_error("load_bin", e))?,
                version: row
                    .try_get::<i64, _>("version")
                    .map_err(|e| map_sqlx_error("load_bin", e))? as u64,
            }),
            None => Ok(BinState::default()),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn load_items(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockItem>, LedgerStoreError> {
        let filter: Option<Uuid> = product_id.map(|id| *id.as_uuid());
        let rows = sqlx::query(
            r#"
            SELECT product_id, location_id, quantity
            FROM stock_items
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY product_id, location_id
            "#,
        )
        .bind(filter)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        rows.iter()
            .map(|row| {
                Ok(StockItem {
                    product_id: ProductId::from_uuid(
                        row.try_get("product_id")
                            .map_err(|e| map_sqlx_error("read_item", e))?,
                    ),
                    location_id: LocationId::from_uuid(
                        row.try_get("location_id")
                            .map_err(|e| map_sqlx_error("read_item", e))?,
                    ),
                    quantity: row
                        .try_get("quantity")
                        .map_err(|e| map_sqlx_error("read_item", e))?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    pub async fn load_movements(&self) -> Result<Vec<StockMovement>, LedgerStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT movement_id, product_id, location_id, quantity, user_id,
                   recorded_at, sequence_number
            FROM stock_movements
            ORDER BY sequence_number ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    /// Remove movements, then items, for the retired entities, atomically.
    #[instrument(skip(self), err)]
    pub async fn retire_rows(&self, scope: &RetireScope) -> Result<(), LedgerStoreError> {
        let (column, ids): (&str, Vec<Uuid>) = match scope {
            RetireScope::Products(ids) => {
                ("product_id", ids.iter().map(|id| *id.as_uuid()).collect())
            }
            RetireScope::Locations(ids) => {
                ("location_id", ids.iter().map(|id| *id.as_uuid()).collect())
            }
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!(
            "DELETE FROM stock_movements WHERE {column} = ANY($1)"
        ))
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("retire_movements", e))?;

        sqlx::query(&format!("DELETE FROM stock_items WHERE {column} = ANY($1)"))
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("retire_items", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(())
    }
}

pub(crate) fn movement_from_row(row: &sqlx::postgres::PgRow) -> Result<StockMovement, LedgerStoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("read_movement", e);
    Ok(StockMovement {
        id: MovementId::from_uuid(row.try_get("movement_id").map_err(read)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(read)?),
        location_id: LocationId::from_uuid(row.try_get("location_id").map_err(read)?),
        quantity: row.try_get("quantity").map_err(read)?,
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(read)?),
        recorded_at: row.try_get("recorded_at").map_err(read)?,
        sequence: row.try_get::<i64, _>("sequence_number").map_err(read)? as u64,
    })
}

pub(crate) fn map_sqlx_error(operation: &str, e: sqlx::Error) -> LedgerStoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => {
                return LedgerStoreError::Concurrency(format!(
                    "{operation}: concurrent writer detected: {db}"
                ));
            }
            Some("23514") => {
                return LedgerStoreError::InvalidCommit(format!(
                    "{operation}: constraint violation: {db}"
                ));
            }
            _ => {}
        }
    }
    LedgerStoreError::Storage(format!("{operation}: {e}"))
}

// Implement the sync LedgerStore trait.
//
// The trait is synchronous, but Postgres operations require async. We use
// tokio::runtime::Handle to run async code in a sync context; this works when
// called from within a tokio runtime.

fn runtime_handle() -> Result<tokio::runtime::Handle, LedgerStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        LedgerStoreError::Storage(
            "PostgresLedgerStore requires an async runtime (tokio). Ensure you're calling from within a tokio runtime context.".to_string(),
        )
    })
}

impl LedgerStore for PostgresLedgerStore {
    fn commit(
        &self,
        actor: UserId,
        drafts: Vec<MovementDraft>,
        expectations: &[(PairKey, u64)],
    ) -> Result<Vec<StockMovement>, LedgerStoreError> {
        runtime_handle()?.block_on(self.commit_batch(actor, drafts, expectations))
    }

    fn bin(&self, key: PairKey) -> Result<BinState, LedgerStoreError> {
        runtime_handle()?.block_on(self.load_bin(key))
    }

    fn item(&self, key: PairKey) -> Result<Option<StockItem>, LedgerStoreError> {
        let items = runtime_handle()?.block_on(self.load_items(Some(key.product_id)))?;
        Ok(items.into_iter().find(|i| i.key() == key))
    }

    fn items(&self) -> Result<Vec<StockItem>, LedgerStoreError> {
        runtime_handle()?.block_on(self.load_items(None))
    }

    fn items_for_product(&self, product_id: ProductId) -> Result<Vec<StockItem>, LedgerStoreError> {
        runtime_handle()?.block_on(self.load_items(Some(product_id)))
    }

    fn movements(&self) -> Result<Vec<StockMovement>, LedgerStoreError> {
        runtime_handle()?.block_on(self.load_movements())
    }

    fn retire(&self, scope: &RetireScope) -> Result<(), LedgerStoreError> {
        runtime_handle()?.block_on(self.retire_rows(scope))
    }
}
