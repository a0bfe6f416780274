use std::collections::HashMap;
use std::sync::RwLock;

use depotrack_analysis::{AnalysisReport, LocationAnalysis, ProductAnalysis, ProductStockStatus};
use depotrack_core::{LocationId, ProductId};

use super::{AnalysisStore, AnalysisStoreError};

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, ProductAnalysis>,
    locations: HashMap<LocationId, LocationAnalysis>,
}

/// In-memory analysis store.
///
/// `replace` swaps both row maps under one write lock, so a half-written run
/// is never observable.
#[derive(Debug, Default)]
pub struct InMemoryAnalysisStore {
    inner: RwLock<Inner>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisStore for InMemoryAnalysisStore {
    fn replace(&self, report: &AnalysisReport) -> Result<(), AnalysisStoreError> {
        let products = report
            .products
            .iter()
            .map(|p| (p.product_id, p.clone()))
            .collect();
        let locations = report
            .locations
            .iter()
            .map(|l| (l.location_id, l.clone()))
            .collect();

        let mut inner = self
            .inner
            .write()
            .map_err(|_| AnalysisStoreError::Storage("lock poisoned".to_string()))?;
        inner.products = products;
        inner.locations = locations;
        Ok(())
    }

    fn product(&self, id: ProductId) -> Option<ProductAnalysis> {
        self.inner.read().ok()?.products.get(&id).cloned()
    }

    fn location(&self, id: LocationId) -> Option<LocationAnalysis> {
        self.inner.read().ok()?.locations.get(&id).cloned()
    }

    fn products_to_reorder(&self) -> Vec<ProductAnalysis> {
        let Ok(inner) = self.inner.read() else {
            return vec![];
        };
        let mut rows: Vec<_> = inner
            .products
            .values()
            .filter(|p| p.status == ProductStockStatus::ReorderNow)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.days_of_supply, p.product_id));
        rows
    }

    fn slow_movers(&self) -> Vec<ProductAnalysis> {
        let Ok(inner) = self.inner.read() else {
            return vec![];
        };
        let mut rows: Vec<_> = inner
            .products
            .values()
            .filter(|p| p.status == ProductStockStatus::SlowMoving)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.last_movement_date, p.product_id));
        rows
    }

    fn location_activity(&self) -> Vec<LocationAnalysis> {
        let Ok(inner) = self.inner.read() else {
            return vec![];
        };
        let mut rows: Vec<_> = inner.locations.values().cloned().collect();
        rows.sort_by_key(|l| (std::cmp::Reverse(l.total_movements), l.location_id));
        rows
    }
}
