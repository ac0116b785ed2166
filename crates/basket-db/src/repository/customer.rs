//! Customer repository: loyalty accounts.

use basket_core::validation::validate_id;
use basket_core::{CoreError, Customer};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Creates a customer with zero points.
    pub async fn create(&self, name: &str) -> DbResult<Customer> {
        validate_id("name", name).map_err(CoreError::from)?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            loyalty_points: 0,
            created_at: Utc::now(),
        };

        debug!(id = %customer.id, "Creating customer");

        sqlx::query(
            "INSERT INTO customers (id, name, loyalty_points, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.loyalty_points)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(customer)
}

/// Adds `points` to the customer's balance.
pub(crate) async fn credit_points(
    conn: &mut SqliteConnection,
    customer_id: &str,
    points: i64,
) -> DbResult<()> {
    debug!(customer_id, points, "Crediting loyalty points");

    let result = sqlx::query("UPDATE customers SET loyalty_points = loyalty_points + ?1 WHERE id = ?2")
        .bind(points)
        .bind(customer_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::not_found("Customer", customer_id).into());
    }
    Ok(())
}
