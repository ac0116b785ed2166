//! Deli order rows: single-use pre-weighed tokens.

use basket_core::DeliOrder;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<DeliOrder>> {
    let order = sqlx::query_as::<_, DeliOrder>("SELECT * FROM deli_orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(order)
}

pub(crate) async fn insert(conn: &mut SqliteConnection, order: &DeliOrder) -> DbResult<()> {
    debug!(
        id = %order.id,
        product_id = %order.base_product_id,
        weight_milli = order.weight_milli,
        "Inserting deli order"
    );

    sqlx::query(
        r#"
        INSERT INTO deli_orders (
            id, base_product_id, weight_milli, total_price_cents,
            is_fulfilled, created_at, fulfilled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&order.id)
    .bind(&order.base_product_id)
    .bind(order.weight_milli)
    .bind(order.total_price_cents)
    .bind(order.is_fulfilled)
    .bind(order.created_at)
    .bind(order.fulfilled_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Atomic check-and-flip of `is_fulfilled`.
///
/// Returns `false` when the token is unknown or was already fulfilled.
pub(crate) async fn fulfill(
    conn: &mut SqliteConnection,
    id: &str,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    debug!(id, "Fulfilling deli order");

    let result = sqlx::query(
        "UPDATE deli_orders SET is_fulfilled = 1, fulfilled_at = ?1 WHERE id = ?2 AND is_fulfilled = 0",
    )
    .bind(at)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
