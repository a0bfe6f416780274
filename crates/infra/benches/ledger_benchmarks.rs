//! Ledger throughput benchmarks: commit path through the full service
//! pipeline (catalog check, rehydrate, decide, commit).

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use depotrack_catalog::{CatalogStore, InMemoryCatalog, Location, LocationCategory, Product};
use depotrack_core::{CategoryId, LocationId, ProductId, UserId};
use depotrack_infra::{InMemoryLedgerStore, StockLedger};

fn setup() -> (
    StockLedger<Arc<InMemoryCatalog>, Arc<InMemoryLedgerStore>>,
    ProductId,
    LocationId,
    LocationId,
    UserId,
) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let store = Arc::new(InMemoryLedgerStore::new());

    let category = LocationCategory::new(CategoryId::new(), "bench").unwrap();
    let category_id = category.id();
    catalog.insert_category(category).unwrap();

    let product = Product::new(
        ProductId::new(),
        "PRD-BENCH",
        "bench product",
        None,
        0,
        chrono::Utc::now(),
    )
    .unwrap();
    let product_id = product.id();
    catalog.insert_product(product).unwrap();

    let source = Location::new(LocationId::new(), "A-01", None, category_id).unwrap();
    let source_id = source.id();
    catalog.insert_location(source).unwrap();
    let destination = Location::new(LocationId::new(), "B-01", None, category_id).unwrap();
    let destination_id = destination.id();
    catalog.insert_location(destination).unwrap();

    let service = StockLedger::new(catalog, store);
    (service, product_id, source_id, destination_id, UserId::new())
}

fn bench_add_stock(c: &mut Criterion) {
    let (service, product, source, _, actor) = setup();

    c.bench_function("add_stock", |b| {
        b.iter(|| {
            service
                .add_stock(product, source, 1, actor)
                .expect("add_stock failed");
        })
    });
}

fn bench_transfer_stock(c: &mut Criterion) {
    let (service, product, source, destination, actor) = setup();
    service
        .add_stock(product, source, 1_000_000_000, actor)
        .expect("seed failed");

    c.bench_function("transfer_stock", |b| {
        b.iter(|| {
            service
                .transfer_stock(product, source, destination, 1, actor)
                .expect("transfer failed");
        })
    });
}

criterion_group!(benches, bench_add_stock, bench_transfer_stock);
criterion_main!(benches);
