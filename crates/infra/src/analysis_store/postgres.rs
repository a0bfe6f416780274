//! Postgres-backed analysis store.
//!
//! ## Assumed schema
//!
//! ```sql
//! CREATE TABLE product_analysis (
//!     product_id         uuid PRIMARY KEY,
//!     analysis_date      timestamptz NOT NULL,
//!     daily_velocity     double precision NOT NULL,
//!     days_of_supply     bigint NOT NULL,
//!     last_movement_date timestamptz,
//!     status             text NOT NULL
//! );
//!
//! CREATE TABLE location_analysis (
//!     location_id     uuid PRIMARY KEY,
//!     analysis_date   timestamptz NOT NULL,
//!     total_movements bigint NOT NULL,
//!     pick_count      bigint NOT NULL,
//!     place_count     bigint NOT NULL,
//!     status          text NOT NULL
//! );
//! ```

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;

use depotrack_analysis::{
    AnalysisReport, LocationActivityStatus, LocationAnalysis, ProductAnalysis, ProductStockStatus,
};
use depotrack_core::{LocationId, ProductId};

use super::{AnalysisStore, AnalysisStoreError};

/// Postgres-backed analysis store.
///
/// Each run replaces all rows in one transaction; a failed run rolls back and
/// leaves the previous run's rows intact.
#[derive(Debug, Clone)]
pub struct PostgresAnalysisStore {
    pool: Arc<PgPool>,
}

impl PostgresAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(
        skip(self, report),
        fields(products = report.products.len(), locations = report.locations.len()),
        err
    )]
    pub async fn replace_rows(&self, report: &AnalysisReport) -> Result<(), AnalysisStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("begin_transaction", e))?;

        sqlx::query("DELETE FROM product_analysis")
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("clear_product_analysis", e))?;
        sqlx::query("DELETE FROM location_analysis")
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("clear_location_analysis", e))?;

        for row in &report.products {
            sqlx::query(
                r#"
                INSERT INTO product_analysis (
                    product_id, analysis_date, daily_velocity,
                    days_of_supply, last_movement_date, status
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(row.product_id.as_uuid())
            .bind(row.analysis_date)
            .bind(row.daily_velocity)
            .bind(row.days_of_supply)
            .bind(row.last_movement_date)
            .bind(row.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("insert_product_analysis", e))?;
        }

        for row in &report.locations {
            sqlx::query(
                r#"
                INSERT INTO location_analysis (
                    location_id, analysis_date, total_movements,
                    pick_count, place_count, status
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(row.location_id.as_uuid())
            .bind(row.analysis_date)
            .bind(row.total_movements as i64)
            .bind(row.pick_count as i64)
            .bind(row.place_count as i64)
            .bind(row.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("insert_location_analysis", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| storage("commit_transaction", e))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn load_product(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductAnalysis>, AnalysisStoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, analysis_date, daily_velocity,
                   days_of_supply, last_movement_date, status
            FROM product_analysis
            WHERE product_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage("load_product_analysis", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_location(
        &self,
        id: LocationId,
    ) -> Result<Option<LocationAnalysis>, AnalysisStoreError> {
        let row = sqlx::query(
            r#"
            SELECT location_id, analysis_date, total_movements,
                   pick_count, place_count, status
            FROM location_analysis
            WHERE location_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage("load_location_analysis", e))?;

        row.as_ref().map(location_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    pub async fn load_products_to_reorder(&self) -> Result<Vec<ProductAnalysis>, AnalysisStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, analysis_date, daily_velocity,
                   days_of_supply, last_movement_date, status
            FROM product_analysis
            WHERE status = 'REORDER_NOW'
            ORDER BY days_of_supply ASC, product_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage("load_products_to_reorder", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn load_slow_movers(&self) -> Result<Vec<ProductAnalysis>, AnalysisStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, analysis_date, daily_velocity,
                   days_of_supply, last_movement_date, status
            FROM product_analysis
            WHERE status = 'SLOW_MOVING'
            ORDER BY last_movement_date ASC NULLS FIRST, product_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage("load_slow_movers", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn load_location_activity(&self) -> Result<Vec<LocationAnalysis>, AnalysisStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT location_id, analysis_date, total_movements,
                   pick_count, place_count, status
            FROM location_analysis
            ORDER BY total_movements DESC, location_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage("load_location_activity", e))?;

        rows.iter().map(location_from_row).collect()
    }
}

fn storage(operation: &str, e: sqlx::Error) -> AnalysisStoreError {
    AnalysisStoreError::Storage(format!("{operation}: {e}"))
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<ProductAnalysis, AnalysisStoreError> {
    let read = |e: sqlx::Error| storage("read_product_analysis", e);
    let status: String = row.try_get("status").map_err(read)?;
    Ok(ProductAnalysis {
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(read)?),
        analysis_date: row.try_get("analysis_date").map_err(read)?,
        daily_velocity: row.try_get("daily_velocity").map_err(read)?,
        days_of_supply: row.try_get("days_of_supply").map_err(read)?,
        last_movement_date: row.try_get("last_movement_date").map_err(read)?,
        status: status
            .parse::<ProductStockStatus>()
            .map_err(AnalysisStoreError::Storage)?,
    })
}

fn location_from_row(row: &sqlx::postgres::PgRow) -> Result<LocationAnalysis, AnalysisStoreError> {
    let read = |e: sqlx::Error| storage("read_location_analysis", e);
    let status: String = row.try_get("status").map_err(read)?;
    Ok(LocationAnalysis {
        location_id: LocationId::from_uuid(row.try_get("location_id").map_err(read)?),
        analysis_date: row.try_get("analysis_date").map_err(read)?,
        total_movements: row.try_get::<i64, _>("total_movements").map_err(read)? as u64,
        pick_count: row.try_get::<i64, _>("pick_count").map_err(read)? as u64,
        place_count: row.try_get::<i64, _>("place_count").map_err(read)? as u64,
        status: status
            .parse::<LocationActivityStatus>()
            .map_err(AnalysisStoreError::Storage)?,
    })
}

fn runtime_handle() -> Result<tokio::runtime::Handle, AnalysisStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        AnalysisStoreError::Storage(
            "PostgresAnalysisStore requires an async runtime (tokio). Ensure you're calling from within a tokio runtime context.".to_string(),
        )
    })
}

// Sync-trait bridge; reads degrade to empty on a missing runtime the same way
// the in-memory store degrades on a poisoned lock.
impl AnalysisStore for PostgresAnalysisStore {
    fn replace(&self, report: &AnalysisReport) -> Result<(), AnalysisStoreError> {
        runtime_handle()?.block_on(self.replace_rows(report))
    }

    fn product(&self, id: ProductId) -> Option<ProductAnalysis> {
        runtime_handle().ok()?.block_on(self.load_product(id)).ok()?
    }

    fn location(&self, id: LocationId) -> Option<LocationAnalysis> {
        runtime_handle().ok()?.block_on(self.load_location(id)).ok()?
    }

    fn products_to_reorder(&self) -> Vec<ProductAnalysis> {
        runtime_handle()
            .and_then(|h| h.block_on(self.load_products_to_reorder()))
            .unwrap_or_default()
    }

    fn slow_movers(&self) -> Vec<ProductAnalysis> {
        runtime_handle()
            .and_then(|h| h.block_on(self.load_slow_movers()))
            .unwrap_or_default()
    }

    fn location_activity(&self) -> Vec<LocationAnalysis> {
        runtime_handle()
            .and_then(|h| h.block_on(self.load_location_activity()))
            .unwrap_or_default()
    }
}
