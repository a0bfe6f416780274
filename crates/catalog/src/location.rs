use serde::{Deserialize, Serialize};

use depotrack_core::{CategoryId, LocationId, StockError, StockResult};

/// Grouping for locations (aisle, cold room, returns area, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCategory {
    id: CategoryId,
    name: String,
}

impl LocationCategory {
    pub fn new(id: CategoryId, name: impl Into<String>) -> StockResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::validation("category name cannot be empty"));
        }
        Ok(Self { id, name })
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) -> StockResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StockError::validation("category name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }
}

/// Catalog entity: a physical storage location.
///
/// Every location belongs to exactly one category; an uncategorized location
/// is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    barcode: String,
    description: Option<String>,
    category_id: CategoryId,
}

impl Location {
    pub fn new(
        id: LocationId,
        barcode: impl Into<String>,
        description: Option<String>,
        category_id: CategoryId,
    ) -> StockResult<Self> {
        let barcode = barcode.into();
        if barcode.trim().is_empty() {
            return Err(StockError::validation("barcode cannot be empty"));
        }
        Ok(Self {
            id,
            barcode,
            description,
            category_id,
        })
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    /// Update the mutable fields. The barcode stays fixed.
    pub fn update(&mut self, description: Option<String>, category_id: CategoryId) {
        self.description = description;
        self.category_id = category_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_requires_barcode() {
        let err = Location::new(LocationId::new(), "", None, CategoryId::new()).unwrap_err();
        assert!(matches!(err, StockError::Validation(_)));
    }

    #[test]
    fn location_can_move_between_categories() {
        let mut location =
            Location::new(LocationId::new(), "A-01-01", None, CategoryId::new()).unwrap();
        let other = CategoryId::new();
        location.update(Some("upper shelf".to_string()), other);
        assert_eq!(location.category_id(), other);
    }
}
