//! Fixtures shared by the persistence tests.

use basket_core::{CommitLine, Product, Promotion, SaleRequest, TenderType};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::pool::{Database, DbConfig};
use crate::retry::RetryPolicy;

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// A WAL database file with several connections, for racing writers.
/// The caller removes the file after closing the pool.
pub(crate) async fn file_db(label: &str) -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("basket-{label}-{}.db", Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(4))
        .await
        .expect("file database")
        .with_retry(RetryPolicy {
            max_attempts: 20,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
        });
    (db, path)
}

/// A unit-sold product. The id is assigned on insert.
pub(crate) fn plain_product(sku: &str, price_cents: i64, stock_quantity: i64) -> Product {
    let now = Utc::now();
    Product {
        id: String::new(),
        sku: sku.to_string(),
        barcode: None,
        name: format!("Test {sku}"),
        price_cents,
        cost_cents: Some(price_cents / 2),
        stock_quantity,
        is_weighed: false,
        unit: "each".to_string(),
        is_age_restricted: false,
        contains_product_id: None,
        case_unit_count: None,
        created_at: now,
        updated_at: now,
    }
}

/// A per-pound product with no stock counter of its own.
pub(crate) fn weighed_product(sku: &str, price_cents: i64) -> Product {
    Product {
        is_weighed: true,
        unit: "lb".to_string(),
        ..plain_product(sku, price_cents, 0)
    }
}

pub(crate) fn case_of(sku: &str, each: &Product, units: i64, stock_quantity: i64) -> Product {
    Product {
        contains_product_id: Some(each.id.clone()),
        case_unit_count: Some(units),
        unit: "case".to_string(),
        ..plain_product(sku, each.price_cents * units, stock_quantity)
    }
}

pub(crate) fn promotion(discount_bps: u32, product_ids: Vec<String>, start: DateTime<Utc>) -> Promotion {
    Promotion {
        id: String::new(),
        description: format!("{}% off", discount_bps / 100),
        discount_bps,
        start_date: start,
        end_date: None,
        is_active: true,
        product_ids,
        created_at: start,
    }
}

/// Inserts a product and receives one lot per `(quantity, expiration)`.
/// Returns the product with its updated counter.
pub(crate) async fn stocked(
    db: &Database,
    sku: &str,
    price_cents: i64,
    lots: &[(i64, Option<NaiveDate>)],
) -> Product {
    let product = db
        .products()
        .insert(&plain_product(sku, price_cents, 0))
        .await
        .expect("insert product");

    for (quantity, expiration) in lots {
        db.inventory()
            .receive_stock(&product.id, *quantity, *expiration)
            .await
            .expect("receive stock");
    }

    db.products()
        .get_by_id(&product.id)
        .await
        .expect("reload product")
        .expect("product exists")
}

pub(crate) fn cash_sale(lines: Vec<CommitLine>, amount_tendered_cents: i64) -> SaleRequest {
    SaleRequest {
        lines,
        tender_type: TenderType::Cash,
        amount_tendered_cents: Some(amount_tendered_cents),
        customer_id: None,
        quoted: None,
    }
}
