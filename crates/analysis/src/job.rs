use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use depotrack_core::{LocationId, ProductId};

use crate::report::{
    AnalysisReport, LocationActivityStatus, LocationAnalysis, NO_OUTFLOW_DAYS_OF_SUPPLY,
    ProductAnalysis, ProductStockStatus,
};
use crate::snapshot::{AnalysisError, AnalysisSnapshot, MovementRecord};

/// Tunables for one analysis pass.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Trailing lookback window for velocity and activity counts.
    pub window_days: u32,
    /// Products below this many days of supply are flagged for reorder.
    pub reorder_horizon_days: i64,
    /// Products whose last movement is older than this are slow movers.
    pub stagnation_horizon_days: i64,
    /// More trailing movements than this makes a location a hot zone.
    pub hot_threshold: u64,
    /// Fewer trailing movements than this makes a location a cold zone.
    pub cold_threshold: u64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            window_days: 30,
            reorder_horizon_days: 15,
            stagnation_horizon_days: 90,
            hot_threshold: 50,
            cold_threshold: 5,
        }
    }
}

/// Deterministic strategic-analysis job over a movement snapshot.
///
/// Model, per product:
/// - velocity = outbound units in the trailing window / window length;
/// - days of supply = on-hand quantity / velocity (sentinel without outflow);
/// - reorder beats slow-moving beats healthy, first match wins.
///
/// Per location: count picks and places in the window and band the total.
#[derive(Debug, Clone)]
pub struct StrategicAnalysisJob {
    snapshot: AnalysisSnapshot,
    params: AnalysisParams,
}

impl StrategicAnalysisJob {
    pub fn new(snapshot: AnalysisSnapshot) -> Self {
        Self {
            snapshot,
            params: AnalysisParams::default(),
        }
    }

    pub fn with_params(mut self, params: AnalysisParams) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> AnalysisParams {
        self.params
    }

    /// Execute the pass. Must not mutate ledger state.
    ///
    /// Rerunning with an unchanged snapshot and the same `now` produces an
    /// identical report.
    pub fn run(&self, now: DateTime<Utc>) -> Result<AnalysisReport, AnalysisError> {
        if self.params.window_days == 0 {
            return Err(AnalysisError::InvalidParams(
                "window_days must be at least 1".to_string(),
            ));
        }
        if self.params.reorder_horizon_days < 0 || self.params.stagnation_horizon_days < 0 {
            return Err(AnalysisError::InvalidParams(
                "horizons cannot be negative".to_string(),
            ));
        }

        let window_start = now - Duration::days(i64::from(self.params.window_days));

        let mut by_product: HashMap<ProductId, Vec<&MovementRecord>> = HashMap::new();
        let mut by_location: HashMap<LocationId, Vec<&MovementRecord>> = HashMap::new();
        for m in &self.snapshot.movements {
            by_product.entry(m.product_id).or_default().push(m);
            by_location.entry(m.location_id).or_default().push(m);
        }

        let empty: Vec<&MovementRecord> = Vec::new();

        let products = self
            .snapshot
            .products
            .iter()
            .map(|&product_id| {
                let movements = by_product.get(&product_id).unwrap_or(&empty);
                analyze_product(product_id, movements, now, window_start, &self.params)
            })
            .collect();

        let locations = self
            .snapshot
            .locations
            .iter()
            .map(|&location_id| {
                let movements = by_location.get(&location_id).unwrap_or(&empty);
                analyze_location(location_id, movements, now, window_start, &self.params)
            })
            .collect();

        Ok(AnalysisReport {
            generated_at: now,
            products,
            locations,
        })
    }
}

fn analyze_product(
    product_id: ProductId,
    movements: &[&MovementRecord],
    now: DateTime<Utc>,
    window_start: DateTime<Utc>,
    params: &AnalysisParams,
) -> ProductAnalysis {
    // On-hand across all locations: the full surviving log sums to the same
    // value as the materialized stock items.
    let current_quantity: i64 = movements.iter().map(|m| m.quantity).sum();

    let total_outbound: i64 = movements
        .iter()
        .filter(|m| m.quantity < 0 && m.recorded_at >= window_start)
        .map(|m| m.quantity.abs())
        .sum();

    let daily_velocity = if total_outbound > 0 {
        total_outbound as f64 / f64::from(params.window_days)
    } else {
        0.0
    };

    let days_of_supply = if daily_velocity > 0.0 {
        (current_quantity as f64 / daily_velocity).floor() as i64
    } else {
        NO_OUTFLOW_DAYS_OF_SUPPLY
    };

    let last_movement_date = movements.iter().map(|m| m.recorded_at).max();

    let stagnant_before = now - Duration::days(params.stagnation_horizon_days);
    let status = if daily_velocity > 0.0 && days_of_supply < params.reorder_horizon_days {
        ProductStockStatus::ReorderNow
    } else if last_movement_date.is_some_and(|last| last < stagnant_before) {
        ProductStockStatus::SlowMoving
    } else {
        ProductStockStatus::Healthy
    };

    ProductAnalysis {
        product_id,
        analysis_date: now,
        daily_velocity,
        days_of_supply,
        last_movement_date,
        status,
    }
}

fn analyze_location(
    location_id: LocationId,
    movements: &[&MovementRecord],
    now: DateTime<Utc>,
    window_start: DateTime<Utc>,
    params: &AnalysisParams,
) -> LocationAnalysis {
    let mut pick_count = 0u64;
    let mut place_count = 0u64;
    for m in movements.iter().filter(|m| m.recorded_at >= window_start) {
        if m.quantity < 0 {
            pick_count += 1;
        } else if m.quantity > 0 {
            place_count += 1;
        }
    }
    let total_movements = pick_count + place_count;

    let status = if total_movements > params.hot_threshold {
        LocationActivityStatus::HotZone
    } else if total_movements < params.cold_threshold {
        LocationActivityStatus::ColdZone
    } else {
        LocationActivityStatus::Normal
    };

    LocationAnalysis {
        location_id,
        analysis_date: now,
        total_movements,
        pick_count,
        place_count,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 3, 5, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn movement(
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
        recorded_at: DateTime<Utc>,
    ) -> MovementRecord {
        MovementRecord {
            product_id,
            location_id,
            quantity,
            recorded_at,
        }
    }

    #[test]
    fn stagnant_product_is_slow_moving() {
        let product = ProductId::new();
        let location = LocationId::new();
        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![location],
            movements: vec![movement(product, location, 5, days_ago(120))],
        };

        let report = StrategicAnalysisJob::new(snapshot).run(now()).unwrap();
        let row = &report.products[0];
        assert_eq!(row.status, ProductStockStatus::SlowMoving);
        assert_eq!(row.daily_velocity, 0.0);
        assert_eq!(row.days_of_supply, NO_OUTFLOW_DAYS_OF_SUPPLY);
        assert_eq!(row.last_movement_date, Some(days_ago(120)));
    }

    #[test]
    fn fast_outflow_triggers_reorder() {
        let product = ProductId::new();
        let location = LocationId::new();
        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![location],
            movements: vec![
                movement(product, location, 400, days_ago(100)),
                movement(product, location, -300, days_ago(10)),
            ],
        };

        let report = StrategicAnalysisJob::new(snapshot).run(now()).unwrap();
        let row = &report.products[0];
        assert_eq!(row.daily_velocity, 10.0);
        assert_eq!(row.days_of_supply, 10);
        assert_eq!(row.status, ProductStockStatus::ReorderNow);
    }

    #[test]
    fn days_of_supply_at_the_horizon_is_not_reorder() {
        let product = ProductId::new();
        let location = LocationId::new();
        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![location],
            movements: vec![
                movement(product, location, 450, days_ago(20)),
                movement(product, location, -300, days_ago(10)),
            ],
        };

        let report = StrategicAnalysisJob::new(snapshot).run(now()).unwrap();
        let row = &report.products[0];
        // 150 on hand at 10/day: exactly 15 days of supply, below-horizon is strict.
        assert_eq!(row.days_of_supply, 15);
        assert_eq!(row.status, ProductStockStatus::Healthy);
    }

    #[test]
    fn product_without_movements_is_healthy() {
        let product = ProductId::new();
        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![],
            movements: vec![],
        };

        let report = StrategicAnalysisJob::new(snapshot).run(now()).unwrap();
        let row = &report.products[0];
        assert_eq!(row.status, ProductStockStatus::Healthy);
        assert_eq!(row.days_of_supply, NO_OUTFLOW_DAYS_OF_SUPPLY);
        assert_eq!(row.last_movement_date, None);
    }

    #[test]
    fn movement_just_inside_stagnation_horizon_is_healthy() {
        let product = ProductId::new();
        let location = LocationId::new();
        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![location],
            movements: vec![movement(product, location, 5, days_ago(89))],
        };

        let report = StrategicAnalysisJob::new(snapshot).run(now()).unwrap();
        assert_eq!(report.products[0].status, ProductStockStatus::Healthy);
    }

    #[test]
    fn location_activity_bands() {
        let product = ProductId::new();
        let hot = LocationId::new();
        let cold = LocationId::new();
        let normal = LocationId::new();

        let mut movements = Vec::new();
        for i in 0..60 {
            let quantity = if i % 2 == 0 { 1 } else { -1 };
            movements.push(movement(product, hot, quantity, days_ago(1)));
        }
        for _ in 0..2 {
            movements.push(movement(product, cold, 1, days_ago(2)));
        }
        for _ in 0..20 {
            movements.push(movement(product, normal, 1, days_ago(3)));
        }
        // Outside the window: must not count towards any band.
        movements.push(movement(product, cold, 1, days_ago(45)));

        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![hot, cold, normal],
            movements,
        };

        let report = StrategicAnalysisJob::new(snapshot).run(now()).unwrap();
        let by_id: HashMap<LocationId, &LocationAnalysis> =
            report.locations.iter().map(|l| (l.location_id, l)).collect();

        assert_eq!(by_id[&hot].status, LocationActivityStatus::HotZone);
        assert_eq!(by_id[&hot].pick_count, 30);
        assert_eq!(by_id[&hot].place_count, 30);
        assert_eq!(by_id[&cold].status, LocationActivityStatus::ColdZone);
        assert_eq!(by_id[&cold].total_movements, 2);
        assert_eq!(by_id[&normal].status, LocationActivityStatus::Normal);
        assert_eq!(by_id[&normal].total_movements, 20);
    }

    #[test]
    fn rerun_with_same_inputs_is_identical() {
        let product = ProductId::new();
        let location = LocationId::new();
        let snapshot = AnalysisSnapshot {
            products: vec![product],
            locations: vec![location],
            movements: vec![
                movement(product, location, 40, days_ago(25)),
                movement(product, location, -15, days_ago(5)),
            ],
        };

        let job = StrategicAnalysisJob::new(snapshot);
        let first = job.run(now()).unwrap();
        let second = job.run(now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_window_is_rejected() {
        let job = StrategicAnalysisJob::new(AnalysisSnapshot::default()).with_params(
            AnalysisParams {
                window_days: 0,
                ..AnalysisParams::default()
            },
        );
        let err = job.run(now()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParams(_)));
    }
}
