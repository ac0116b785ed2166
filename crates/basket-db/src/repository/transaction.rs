//! # Transaction Repository
//!
//! Committed transactions and their immutable line snapshots. Rows are only
//! ever inserted; the single permitted update is linking a sale to the refund
//! that reversed it.

use basket_core::{Transaction, TransactionItem};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Loads a transaction with its items in receipt order.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Most recent transactions first, without items.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions ORDER BY created_at DESC, id ASC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(transactions)
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Transaction>> {
    let header = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(mut transaction) = header else {
        return Ok(None);
    };

    transaction.items = sqlx::query_as::<_, TransactionItem>(
        "SELECT * FROM transaction_items WHERE transaction_id = ?1 ORDER BY position ASC",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(transaction))
}

/// Writes the transaction header and every item snapshot.
pub(crate) async fn insert(conn: &mut SqliteConnection, transaction: &Transaction) -> DbResult<()> {
    debug!(
        id = %transaction.id,
        total_cents = transaction.total_cents,
        items = transaction.items.len(),
        "Inserting transaction"
    );

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, subtotal_cents, discount_cents, tax_cents, total_cents,
            tender_type, amount_tendered_cents, change_given_cents,
            customer_id, refunded_by_id, refund_of_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&transaction.id)
    .bind(transaction.subtotal_cents)
    .bind(transaction.discount_cents)
    .bind(transaction.tax_cents)
    .bind(transaction.total_cents)
    .bind(transaction.tender_type)
    .bind(transaction.amount_tendered_cents)
    .bind(transaction.change_given_cents)
    .bind(&transaction.customer_id)
    .bind(&transaction.refunded_by_id)
    .bind(&transaction.refund_of_id)
    .bind(transaction.created_at)
    .execute(&mut *conn)
    .await?;

    for item in &transaction.items {
        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, position, product_id, sku, name,
                price_cents, cost_cents, quantity, weight_milli,
                discount_cents, line_total_cents, deli_order_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transaction_id)
        .bind(item.position)
        .bind(&item.product_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.price_cents)
        .bind(item.cost_cents)
        .bind(item.quantity)
        .bind(item.weight_milli)
        .bind(item.discount_cents)
        .bind(item.line_total_cents)
        .bind(&item.deli_order_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Sets `refunded_by_id` on the origin, only if it is still unset.
///
/// Returns `false` when another refund got there first.
pub(crate) async fn link_refund(
    conn: &mut SqliteConnection,
    origin_id: &str,
    refund_id: &str,
) -> DbResult<bool> {
    debug!(origin_id, refund_id, "Linking refund to origin");

    let result = sqlx::query(
        "UPDATE transactions SET refunded_by_id = ?1 WHERE id = ?2 AND refunded_by_id IS NULL",
    )
    .bind(refund_id)
    .bind(origin_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Whether a sale line already carries this deli token.
pub(crate) async fn deli_order_sold(conn: &mut SqliteConnection, deli_order_id: &str) -> DbResult<bool> {
    let sold: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM transaction_items
            WHERE deli_order_id = ?1 AND quantity > 0
        )
        "#,
    )
    .bind(deli_order_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(sold)
}
