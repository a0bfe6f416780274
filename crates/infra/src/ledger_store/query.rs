use chrono::{DateTime, Utc};
use uuid::Uuid;

use depotrack_core::{LocationId, ProductId};
use depotrack_ledger::StockMovement;

use super::postgres::{PostgresLedgerStore, map_sqlx_error, movement_from_row};
use super::r#trait::LedgerStoreError;

/// Filter for movement-history queries. All fields are optional and combine
/// with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub location_id: Option<LocationId>,
    pub recorded_after: Option<DateTime<Utc>>,
    pub recorded_before: Option<DateTime<Utc>>,
}

/// Pagination window, newest movements first.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Filtered access to the movement log (history views, audits).
#[async_trait::async_trait]
pub trait MovementQuery: Send + Sync {
    async fn query_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<Vec<StockMovement>, LedgerStoreError>;
}

#[async_trait::async_trait]
impl MovementQuery for PostgresLedgerStore {
    async fn query_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<Vec<StockMovement>, LedgerStoreError> {
        // Optional filters via NULL-checked parameters, one parameterized query.
        let product: Option<Uuid> = filter.product_id.map(|id| *id.as_uuid());
        let location: Option<Uuid> = filter.location_id.map(|id| *id.as_uuid());

        let rows = sqlx::query(
            r#"
            SELECT movement_id, product_id, location_id, quantity, user_id,
                   recorded_at, sequence_number
            FROM stock_movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
                AND ($2::uuid IS NULL OR location_id = $2)
                AND ($3::timestamptz IS NULL OR recorded_at >= $3)
                AND ($4::timestamptz IS NULL OR recorded_at <= $4)
            ORDER BY sequence_number DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(product)
        .bind(location)
        .bind(filter.recorded_after)
        .bind(filter.recorded_before)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("query_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }
}
