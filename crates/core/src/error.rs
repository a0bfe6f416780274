//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere and are
/// mapped into `Internal` at the service boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A value failed validation (e.g. malformed input, empty barcode).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced product or location does not exist.
    #[error("not found")]
    NotFound,

    /// A zero or negative movement amount was requested.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// A removal or transfer exceeds the on-hand quantity for the pair.
    #[error("insufficient stock (on hand: {on_hand}, requested: {requested})")]
    InsufficientStock { on_hand: i64, requested: i64 },

    /// A transfer whose source equals its destination.
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Serialization failure on a contested (product, location) pair.
    /// Safe to retry a bounded number of times with backoff.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// A uniqueness or referential guard was violated (e.g. duplicate
    /// barcode, category still referenced by locations).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected persistence failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn invalid_transfer(msg: impl Into<String>) -> Self {
        Self::InvalidTransfer(msg.into())
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller may retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}
