//! # Product Repository
//!
//! Catalog lookups and the authoritative `stock_quantity` counter.
//!
//! ## Stock Counter Writes
//! ```text
//! decrement_stock(SODA, 2)
//!      │
//!      ▼
//! UPDATE products SET stock_quantity = stock_quantity - 2
//!  WHERE id = 'soda' AND stock_quantity >= 2
//!      │
//!      ├── 1 row  ──► done
//!      └── 0 rows ──► re-read: missing      → NotFound
//!                              below 2      → InsufficientStock
//!                              otherwise    → Conflict (retry)
//! ```

use basket_core::validation::{validate_price_cents, validate_sku};
use basket_core::{CoreError, Product};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Scanner lookup.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE barcode = ?1")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Inserts a product. Catalog maintenance lives elsewhere; this exists for
    /// seeding and fixtures.
    ///
    /// An empty `id` gets a generated UUID.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_sku(&product.sku).map_err(CoreError::from)?;
        validate_price_cents(product.price_cents).map_err(CoreError::from)?;

        let mut product = product.clone();
        if product.id.is_empty() {
            product.id = Uuid::new_v4().to_string();
        }

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name,
                price_cents, cost_cents, stock_quantity,
                is_weighed, unit, is_age_restricted,
                contains_product_id, case_unit_count,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock_quantity)
        .bind(product.is_weighed)
        .bind(&product.unit)
        .bind(product.is_age_restricted)
        .bind(&product.contains_product_id)
        .bind(product.case_unit_count)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Products with `0 < stock_quantity <= threshold`, lowest first.
    pub async fn low_stock(&self, threshold: i64, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE stock_quantity > 0 AND stock_quantity <= ?1
            ORDER BY stock_quantity ASC, name ASC
            LIMIT ?2
            "#,
        )
        .bind(threshold)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// In-transaction operations
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

/// Like [`fetch`], but a missing product is `NotFound`.
pub(crate) async fn require(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", id).into())
}

/// Guarded decrement of the on-hand counter.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    sku: &str,
    quantity: i64,
) -> DbResult<()> {
    debug!(product_id, quantity, "Decrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity - ?1, updated_at = ?2
        WHERE id = ?3 AND stock_quantity >= ?1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let available: Option<i64> =
        sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    Err(match available {
        None => CoreError::not_found("Product", product_id).into(),
        Some(available) if available < quantity => CoreError::InsufficientStock {
            sku: sku.to_string(),
            available,
            requested: quantity,
        }
        .into(),
        Some(_) => DbError::conflict(format!("stock of {sku} changed concurrently")),
    })
}

pub(crate) async fn increment_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    debug!(product_id, quantity, "Incrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity + ?1, updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::not_found("Product", product_id).into());
    }
    Ok(())
}
