//! Catalog domain module.
//!
//! This crate holds the Product / Location / LocationCategory entities and the
//! storage-agnostic `CatalogStore` they are kept in. It is a leaf: everything
//! else reads the catalog, nothing here touches stock quantities.

pub mod location;
pub mod product;
pub mod store;

pub use location::{Location, LocationCategory};
pub use product::Product;
pub use store::{CatalogStore, InMemoryCatalog};
