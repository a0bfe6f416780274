//! Ledger storage boundary.
//!
//! The movement log is append-only and the stock-item table is a materialized
//! view over it; both are maintained inside one atomic commit so readers never
//! observe them out of step.

mod in_memory;
mod postgres;
mod query;
mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use query::{MovementFilter, MovementQuery, Pagination};
pub use r#trait::{BinState, LedgerStore, LedgerStoreError, RetireScope};
