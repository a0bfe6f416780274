use std::collections::HashMap;
use std::sync::RwLock;

use depotrack_core::{CategoryId, LocationId, ProductId, StockError, StockResult};

use crate::location::{Location, LocationCategory};
use crate::product::Product;

/// Storage boundary for catalog entities.
///
/// Uniqueness (barcodes, category names) is enforced here, at the storage
/// layer, not at call sites. Removal of products/locations assumes dependent
/// ledger rows are already retired; the stock service orchestrates that order.
pub trait CatalogStore: Send + Sync {
    fn insert_category(&self, category: LocationCategory) -> StockResult<()>;
    fn update_category(&self, category: LocationCategory) -> StockResult<()>;
    /// Fails with `Conflict` while any location references the category.
    fn remove_category(&self, id: CategoryId) -> StockResult<()>;
    fn category(&self, id: CategoryId) -> Option<LocationCategory>;
    fn categories(&self) -> Vec<LocationCategory>;

    fn insert_product(&self, product: Product) -> StockResult<()>;
    fn update_product(&self, product: Product) -> StockResult<()>;
    fn remove_products(&self, ids: &[ProductId]) -> StockResult<()>;
    fn product(&self, id: ProductId) -> Option<Product>;
    fn product_by_barcode(&self, barcode: &str) -> Option<Product>;
    fn products(&self) -> Vec<Product>;
    fn product_exists(&self, id: ProductId) -> bool {
        self.product(id).is_some()
    }

    fn insert_location(&self, location: Location) -> StockResult<()>;
    fn update_location(&self, location: Location) -> StockResult<()>;
    fn remove_locations(&self, ids: &[LocationId]) -> StockResult<()>;
    fn location(&self, id: LocationId) -> Option<Location>;
    fn location_by_barcode(&self, barcode: &str) -> Option<Location>;
    fn locations(&self) -> Vec<Location>;
    fn location_exists(&self, id: LocationId) -> bool {
        self.location(id).is_some()
    }
}

#[derive(Debug, Default)]
struct Inner {
    categories: HashMap<CategoryId, LocationCategory>,
    products: HashMap<ProductId, Product>,
    locations: HashMap<LocationId, Location>,
    product_barcodes: HashMap<String, ProductId>,
    location_barcodes: HashMap<String, LocationId>,
    category_names: HashMap<String, CategoryId>,
}

/// In-memory catalog store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<Inner>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StockResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StockError::internal("lock poisoned"))
    }

    fn write(&self) -> StockResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StockError::internal("lock poisoned"))
    }
}

impl CatalogStore for InMemoryCatalog {
    fn insert_category(&self, category: LocationCategory) -> StockResult<()> {
        let mut inner = self.write()?;
        if inner.category_names.contains_key(category.name()) {
            return Err(StockError::conflict(format!(
                "category '{}' already exists",
                category.name()
            )));
        }
        inner
            .category_names
            .insert(category.name().to_string(), category.id());
        inner.categories.insert(category.id(), category);
        Ok(())
    }

    fn update_category(&self, category: LocationCategory) -> StockResult<()> {
        let mut inner = self.write()?;
        let Some(existing) = inner.categories.get(&category.id()).cloned() else {
            return Err(StockError::not_found());
        };
        if existing.name() != category.name() {
            if inner.category_names.contains_key(category.name()) {
                return Err(StockError::conflict(format!(
                    "category '{}' already exists",
                    category.name()
                )));
            }
            inner.category_names.remove(existing.name());
            inner
                .category_names
                .insert(category.name().to_string(), category.id());
        }
        inner.categories.insert(category.id(), category);
        Ok(())
    }

    fn remove_category(&self, id: CategoryId) -> StockResult<()> {
        let mut inner = self.write()?;
        let Some(existing) = inner.categories.get(&id).cloned() else {
            return Err(StockError::not_found());
        };
        if inner.locations.values().any(|l| l.category_id() == id) {
            return Err(StockError::conflict(
                "category is still referenced by locations",
            ));
        }
        inner.category_names.remove(existing.name());
        inner.categories.remove(&id);
        Ok(())
    }

    fn category(&self, id: CategoryId) -> Option<LocationCategory> {
        self.read().ok()?.categories.get(&id).cloned()
    }

    fn categories(&self) -> Vec<LocationCategory> {
        let Ok(inner) = self.read() else {
            return vec![];
        };
        let mut all: Vec<_> = inner.categories.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    fn insert_product(&self, product: Product) -> StockResult<()> {
        let mut inner = self.write()?;
        if inner.product_barcodes.contains_key(product.barcode()) {
            return Err(StockError::conflict(format!(
                "barcode '{}' is already registered",
                product.barcode()
            )));
        }
        inner
            .product_barcodes
            .insert(product.barcode().to_string(), product.id());
        inner.products.insert(product.id(), product);
        Ok(())
    }

    fn update_product(&self, product: Product) -> StockResult<()> {
        let mut inner = self.write()?;
        let Some(existing) = inner.products.get(&product.id()) else {
            return Err(StockError::not_found());
        };
        if existing.barcode() != product.barcode() {
            return Err(StockError::conflict("product barcode is immutable"));
        }
        inner.products.insert(product.id(), product);
        Ok(())
    }

    fn remove_products(&self, ids: &[ProductId]) -> StockResult<()> {
        let mut inner = self.write()?;
        for id in ids {
            if !inner.products.contains_key(id) {
                return Err(StockError::not_found());
            }
        }
        for id in ids {
            if let Some(product) = inner.products.remove(id) {
                inner.product_barcodes.remove(product.barcode());
            }
        }
        Ok(())
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        self.read().ok()?.products.get(&id).cloned()
    }

    fn product_by_barcode(&self, barcode: &str) -> Option<Product> {
        let inner = self.read().ok()?;
        let id = inner.product_barcodes.get(barcode)?;
        inner.products.get(id).cloned()
    }

    fn products(&self) -> Vec<Product> {
        let Ok(inner) = self.read() else {
            return vec![];
        };
        let mut all: Vec<_> = inner.products.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    fn insert_location(&self, location: Location) -> StockResult<()> {
        let mut inner = self.write()?;
        if !inner.categories.contains_key(&location.category_id()) {
            return Err(StockError::not_found());
        }
        if inner.location_barcodes.contains_key(location.barcode()) {
            return Err(StockError::conflict(format!(
                "barcode '{}' is already registered",
                location.barcode()
            )));
        }
        inner
            .location_barcodes
            .insert(location.barcode().to_string(), location.id());
        inner.locations.insert(location.id(), location);
        Ok(())
    }

    fn update_location(&self, location: Location) -> StockResult<()> {
        let mut inner = self.write()?;
        let Some(existing) = inner.locations.get(&location.id()) else {
            return Err(StockError::not_found());
        };
        if existing.barcode() != location.barcode() {
            return Err(StockError::conflict("location barcode is immutable"));
        }
        if !inner.categories.contains_key(&location.category_id()) {
            return Err(StockError::not_found());
        }
        inner.locations.insert(location.id(), location);
        Ok(())
    }

    fn remove_locations(&self, ids: &[LocationId]) -> StockResult<()> {
        let mut inner = self.write()?;
        for id in ids {
            if !inner.locations.contains_key(id) {
                return Err(StockError::not_found());
            }
        }
        for id in ids {
            if let Some(location) = inner.locations.remove(id) {
                inner.location_barcodes.remove(location.barcode());
            }
        }
        Ok(())
    }

    fn location(&self, id: LocationId) -> Option<Location> {
        self.read().ok()?.locations.get(&id).cloned()
    }

    fn location_by_barcode(&self, barcode: &str) -> Option<Location> {
        let inner = self.read().ok()?;
        let id = inner.location_barcodes.get(barcode)?;
        inner.locations.get(id).cloned()
    }

    fn locations(&self) -> Vec<Location> {
        let Ok(inner) = self.read() else {
            return vec![];
        };
        let mut all: Vec<_> = inner.locations.values().cloned().collect();
        all.sort_by(|a, b| a.barcode().cmp(b.barcode()));
        all
    }
}

impl<S> CatalogStore for std::sync::Arc<S>
where
    S: CatalogStore + ?Sized,
{
    fn insert_category(&self, category: LocationCategory) -> StockResult<()> {
        (**self).insert_category(category)
    }
    fn update_category(&self, category: LocationCategory) -> StockResult<()> {
        (**self).update_category(category)
    }
    fn remove_category(&self, id: CategoryId) -> StockResult<()> {
        (**self).remove_category(id)
    }
    fn category(&self, id: CategoryId) -> Option<LocationCategory> {
        (**self).category(id)
    }
    fn categories(&self) -> Vec<LocationCategory> {
        (**self).categories()
    }
    fn insert_product(&self, product: Product) -> StockResult<()> {
        (**self).insert_product(product)
    }
    fn update_product(&self, product: Product) -> StockResult<()> {
        (**self).update_product(product)
    }
    fn remove_products(&self, ids: &[ProductId]) -> StockResult<()> {
        (**self).remove_products(ids)
    }
    fn product(&self, id: ProductId) -> Option<Product> {
        (**self).product(id)
    }
    fn product_by_barcode(&self, barcode: &str) -> Option<Product> {
        (**self).product_by_barcode(barcode)
    }
    fn products(&self) -> Vec<Product> {
        (**self).products()
    }
    fn insert_location(&self, location: Location) -> StockResult<()> {
        (**self).insert_location(location)
    }
    fn update_location(&self, location: Location) -> StockResult<()> {
        (**self).update_location(location)
    }
    fn remove_locations(&self, ids: &[LocationId]) -> StockResult<()> {
        (**self).remove_locations(ids)
    }
    fn location(&self, id: LocationId) -> Option<Location> {
        (**self).location(id)
    }
    fn location_by_barcode(&self, barcode: &str) -> Option<Location> {
        (**self).location_by_barcode(barcode)
    }
    fn locations(&self) -> Vec<Location> {
        (**self).locations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(name: &str) -> LocationCategory {
        LocationCategory::new(CategoryId::new(), name).unwrap()
    }

    fn product(barcode: &str) -> Product {
        Product::new(ProductId::new(), barcode, "widget", None, 0, Utc::now()).unwrap()
    }

    #[test]
    fn duplicate_product_barcode_is_rejected() {
        let store = InMemoryCatalog::new();
        store.insert_product(product("PRD-1")).unwrap();
        let err = store.insert_product(product("PRD-1")).unwrap_err();
        assert!(matches!(err, StockError::Conflict(_)));
    }

    #[test]
    fn location_requires_existing_category() {
        let store = InMemoryCatalog::new();
        let loc = Location::new(LocationId::new(), "A-01", None, CategoryId::new()).unwrap();
        let err = store.insert_location(loc).unwrap_err();
        assert_eq!(err, StockError::NotFound);
    }

    #[test]
    fn category_with_locations_cannot_be_removed() {
        let store = InMemoryCatalog::new();
        let cat = category("shelving");
        let cat_id = cat.id();
        store.insert_category(cat).unwrap();
        store
            .insert_location(Location::new(LocationId::new(), "A-01", None, cat_id).unwrap())
            .unwrap();

        let err = store.remove_category(cat_id).unwrap_err();
        assert!(matches!(err, StockError::Conflict(_)));
    }

    #[test]
    fn barcode_lookup_resolves_products_and_locations() {
        let store = InMemoryCatalog::new();
        let cat = category("shelving");
        let cat_id = cat.id();
        store.insert_category(cat).unwrap();

        let p = product("PRD-1");
        let p_id = p.id();
        store.insert_product(p).unwrap();
        store
            .insert_location(Location::new(LocationId::new(), "A-01", None, cat_id).unwrap())
            .unwrap();

        assert_eq!(store.product_by_barcode("PRD-1").unwrap().id(), p_id);
        assert_eq!(store.location_by_barcode("A-01").unwrap().barcode(), "A-01");
        assert!(store.product_by_barcode("missing").is_none());
    }

    #[test]
    fn removing_product_frees_its_barcode() {
        let store = InMemoryCatalog::new();
        let p = product("PRD-1");
        let p_id = p.id();
        store.insert_product(p).unwrap();
        store.remove_products(&[p_id]).unwrap();
        assert!(store.product_by_barcode("PRD-1").is_none());
        store.insert_product(product("PRD-1")).unwrap();
    }
}
