//! `depotrack-infra` — storage backends and orchestration.
//!
//! Composes the pure domain crates (catalog, ledger, analysis) with concrete
//! stores and the background analysis runner. Domain crates contain no IO;
//! everything that locks, sleeps or talks to Postgres lives here.

pub mod analysis_runner;
pub mod analysis_store;
pub mod clock;
pub mod ledger_store;
pub mod observability;
pub mod stock_service;


pub use analysis_runner::{
    LedgerSnapshotSource, RunnerHandle, AnalysisSchedule, StrategicAnalysisRunner,
    run_analysis_once,
};
pub use analysis_store::{
    AnalysisStore, AnalysisStoreError, InMemoryAnalysisStore, PostgresAnalysisStore,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger_store::{
    BinState, InMemoryLedgerStore, LedgerStore, LedgerStoreError, PostgresLedgerStore, RetireScope,
};
pub use stock_service::{OccupancySummary, StockLedger};
