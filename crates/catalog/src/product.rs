use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depotrack_core::{ProductId, StockError, StockResult};

/// Catalog entity: a discrete product tracked by the ledger.
///
/// The barcode is the human-facing scan key and is immutable after creation;
/// name, description and the reorder threshold may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    barcode: String,
    name: String,
    description: Option<String>,
    /// Informational reorder threshold, not enforced by the ledger.
    minimum_stock_level: i64,
    created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        barcode: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        minimum_stock_level: i64,
        created_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        let barcode = barcode.into();
        let name = name.into();

        if barcode.trim().is_empty() {
            return Err(StockError::validation("barcode cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(StockError::validation("name cannot be empty"));
        }
        if minimum_stock_level < 0 {
            return Err(StockError::validation(
                "minimum_stock_level cannot be negative",
            ));
        }

        Ok(Self {
            id,
            barcode,
            name,
            description,
            minimum_stock_level,
            created_at,
        })
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn minimum_stock_level(&self) -> i64 {
        self.minimum_stock_level
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Update the mutable fields. The barcode stays fixed.
    pub fn update(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        minimum_stock_level: i64,
    ) -> StockResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::validation("name cannot be empty"));
        }
        if minimum_stock_level < 0 {
            return Err(StockError::validation(
                "minimum_stock_level cannot be negative",
            ));
        }
        self.name = name;
        self.description = description;
        self.minimum_stock_level = minimum_stock_level;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn new_product_validates_fields() {
        let product = Product::new(
            ProductId::new(),
            "PRD-0001",
            "M8 hex bolt",
            Some("zinc plated".to_string()),
            10,
            test_time(),
        )
        .unwrap();
        assert_eq!(product.barcode(), "PRD-0001");
        assert_eq!(product.minimum_stock_level(), 10);
    }

    #[test]
    fn empty_barcode_is_rejected() {
        let err =
            Product::new(ProductId::new(), "  ", "M8 hex bolt", None, 0, test_time()).unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn negative_minimum_stock_level_is_rejected() {
        let err =
            Product::new(ProductId::new(), "PRD-0001", "bolt", None, -1, test_time()).unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn update_keeps_barcode() {
        let mut product =
            Product::new(ProductId::new(), "PRD-0001", "bolt", None, 0, test_time()).unwrap();
        product.update("M8 hex bolt", None, 25).unwrap();
        assert_eq!(product.barcode(), "PRD-0001");
        assert_eq!(product.name(), "M8 hex bolt");
        assert_eq!(product.minimum_stock_level(), 25);
    }
}
