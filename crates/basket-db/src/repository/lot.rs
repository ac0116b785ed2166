//! # Lot Repository
//!
//! Dated batches of received stock. Lots are a secondary ledger beside
//! `products.stock_quantity`: they decide *which* units a sale consumed so
//! that expiration can be tracked, while the product counter stays the
//! admission authority.

use basket_core::InventoryLot;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// One row of the nearing-expiration report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringLot {
    pub lot_id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity_remaining: i64,
    pub expiration_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    /// Every lot of a product, including empty ones, in FEFO order.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<InventoryLot>> {
        let lots = sqlx::query_as::<_, InventoryLot>(
            r#"
            SELECT * FROM inventory_lots
            WHERE product_id = ?1
            ORDER BY expiration_date IS NULL, expiration_date ASC, received_at ASC, id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lots)
    }

    /// Sum of `quantity_remaining` across a product's lots.
    pub async fn total_remaining(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_remaining), 0) FROM inventory_lots WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Lots with stock left that expire in `[from, to]`, earliest first.
    pub async fn expiring_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<ExpiringLot>> {
        let lots = sqlx::query_as::<_, ExpiringLot>(
            r#"
            SELECT
                l.id AS lot_id,
                l.product_id,
                p.sku,
                p.name,
                l.quantity_remaining,
                l.expiration_date
            FROM inventory_lots l
            JOIN products p ON p.id = l.product_id
            WHERE l.quantity_remaining > 0
              AND l.expiration_date IS NOT NULL
              AND l.expiration_date >= ?1
              AND l.expiration_date <= ?2
            ORDER BY l.expiration_date ASC, p.name ASC, l.id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(lots)
    }
}

// =============================================================================
// In-transaction operations
// =============================================================================

/// Lots of a product that still hold stock.
pub(crate) async fn open_lots(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<InventoryLot>> {
    let lots = sqlx::query_as::<_, InventoryLot>(
        r#"
        SELECT * FROM inventory_lots
        WHERE product_id = ?1 AND quantity_remaining > 0
        ORDER BY expiration_date IS NULL, expiration_date ASC, received_at ASC, id ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lots)
}

/// Creates a full lot of `quantity` units.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    expiration_date: Option<NaiveDate>,
) -> DbResult<InventoryLot> {
    let lot = InventoryLot {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        quantity_received: quantity,
        quantity_remaining: quantity,
        expiration_date,
        received_at: Utc::now(),
    };

    debug!(lot_id = %lot.id, product_id, quantity, ?expiration_date, "Inserting lot");

    sqlx::query(
        r#"
        INSERT INTO inventory_lots (
            id, product_id, quantity_received, quantity_remaining, expiration_date, received_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&lot.id)
    .bind(&lot.product_id)
    .bind(lot.quantity_received)
    .bind(lot.quantity_remaining)
    .bind(lot.expiration_date)
    .bind(lot.received_at)
    .execute(&mut *conn)
    .await?;

    Ok(lot)
}

/// Guarded draw of `quantity` units from one lot.
///
/// The caller planned this draw from a read inside the same transaction, so
/// a guard miss means another writer consumed the lot first.
pub(crate) async fn draw(conn: &mut SqliteConnection, lot_id: &str, quantity: i64) -> DbResult<()> {
    debug!(lot_id, quantity, "Drawing from lot");

    let result = sqlx::query(
        r#"
        UPDATE inventory_lots
        SET quantity_remaining = quantity_remaining - ?1
        WHERE id = ?2 AND quantity_remaining >= ?1
        "#,
    )
    .bind(quantity)
    .bind(lot_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!("lot {lot_id} changed concurrently")));
    }
    Ok(())
}
