use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depotrack_core::{LocationId, ProductId};

/// `days_of_supply` sentinel: the product shows no measurable outflow in the
/// trailing window, so no exhaustion date can be projected.
pub const NO_OUTFLOW_DAYS_OF_SUPPLY: i64 = 9999;

/// Reorder classification of a product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStockStatus {
    Healthy,
    ReorderNow,
    SlowMoving,
}

impl ProductStockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStockStatus::Healthy => "HEALTHY",
            ProductStockStatus::ReorderNow => "REORDER_NOW",
            ProductStockStatus::SlowMoving => "SLOW_MOVING",
        }
    }
}

impl core::str::FromStr for ProductStockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEALTHY" => Ok(ProductStockStatus::Healthy),
            "REORDER_NOW" => Ok(ProductStockStatus::ReorderNow),
            "SLOW_MOVING" => Ok(ProductStockStatus::SlowMoving),
            other => Err(format!("unknown product stock status '{other}'")),
        }
    }
}

/// Activity classification of a location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationActivityStatus {
    Normal,
    HotZone,
    ColdZone,
}

impl LocationActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationActivityStatus::Normal => "NORMAL",
            LocationActivityStatus::HotZone => "HOT_ZONE",
            LocationActivityStatus::ColdZone => "COLD_ZONE",
        }
    }
}

impl core::str::FromStr for LocationActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(LocationActivityStatus::Normal),
            "HOT_ZONE" => Ok(LocationActivityStatus::HotZone),
            "COLD_ZONE" => Ok(LocationActivityStatus::ColdZone),
            other => Err(format!("unknown location activity status '{other}'")),
        }
    }
}

/// Per-product analysis row. One row per product, replaced on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_id: ProductId,
    pub analysis_date: DateTime<Utc>,
    /// Average outbound units per day over the trailing window; 0.0 without
    /// measurable outflow.
    pub daily_velocity: f64,
    /// Projected days until on-hand stock is exhausted at the current
    /// velocity, or [`NO_OUTFLOW_DAYS_OF_SUPPLY`].
    pub days_of_supply: i64,
    pub last_movement_date: Option<DateTime<Utc>>,
    pub status: ProductStockStatus,
}

/// Per-location analysis row. One row per location, replaced on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationAnalysis {
    pub location_id: LocationId,
    pub analysis_date: DateTime<Utc>,
    pub total_movements: u64,
    /// Outbound movements in the window.
    pub pick_count: u64,
    /// Inbound movements in the window.
    pub place_count: u64,
    pub status: LocationActivityStatus,
}

/// Output of one full analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub products: Vec<ProductAnalysis>,
    pub locations: Vec<LocationAnalysis>,
}
