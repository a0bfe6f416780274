//! Analysis row storage.
//!
//! Analysis rows are owned exclusively by the analysis pass and are read-only
//! to everyone else. Each run replaces the previous rows atomically: at most
//! one writer per row at a time, and readers never see a mix of two runs.

mod in_memory;
mod postgres;

use std::sync::Arc;

use thiserror::Error;

use depotrack_analysis::{AnalysisReport, LocationAnalysis, ProductAnalysis};
use depotrack_core::{LocationId, ProductId};

pub use in_memory::InMemoryAnalysisStore;
pub use postgres::PostgresAnalysisStore;

#[derive(Debug, Error)]
pub enum AnalysisStoreError {
    #[error("storage failure: {0}")]
    Storage(String),
}

pub trait AnalysisStore: Send + Sync {
    /// Atomically replace all analysis rows with the report's rows.
    fn replace(&self, report: &AnalysisReport) -> Result<(), AnalysisStoreError>;

    fn product(&self, id: ProductId) -> Option<ProductAnalysis>;

    fn location(&self, id: LocationId) -> Option<LocationAnalysis>;

    /// Products flagged for reorder, most urgent (fewest days of supply) first.
    fn products_to_reorder(&self) -> Vec<ProductAnalysis>;

    /// Slow movers, stalest (oldest last movement) first.
    fn slow_movers(&self) -> Vec<ProductAnalysis>;

    /// All location rows, busiest first.
    fn location_activity(&self) -> Vec<LocationAnalysis>;
}

impl<S> AnalysisStore for Arc<S>
where
    S: AnalysisStore + ?Sized,
{
    fn replace(&self, report: &AnalysisReport) -> Result<(), AnalysisStoreError> {
        (**self).replace(report)
    }

    fn product(&self, id: ProductId) -> Option<ProductAnalysis> {
        (**self).product(id)
    }

    fn location(&self, id: LocationId) -> Option<LocationAnalysis> {
        (**self).location(id)
    }

    fn products_to_reorder(&self) -> Vec<ProductAnalysis> {
        (**self).products_to_reorder()
    }

    fn slow_movers(&self) -> Vec<ProductAnalysis> {
        (**self).slow_movers()
    }

    fn location_activity(&self) -> Vec<LocationAnalysis> {
        (**self).location_activity()
    }
}
