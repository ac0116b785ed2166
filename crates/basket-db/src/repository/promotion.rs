//! # Promotion Repository
//!
//! Promotions are stored as a row plus a product set in `promotion_products`.
//! Reads return them most recently created first, which is the order the
//! pricing engine's first-match rule walks.

use basket_core::validation::validate_discount_bps;
use basket_core::{active_promotions, CoreError, Promotion};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct PromotionRow {
    id: String,
    description: String,
    discount_bps: i64,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl PromotionRow {
    fn into_promotion(self, product_ids: Vec<String>) -> DbResult<Promotion> {
        let discount_bps = u32::try_from(self.discount_bps).map_err(|_| {
            DbError::Internal(format!(
                "promotion {} has invalid discount_bps {}",
                self.id, self.discount_bps
            ))
        })?;

        Ok(Promotion {
            id: self.id,
            description: self.description,
            discount_bps,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            product_ids,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// All promotions, newest first.
    pub async fn list(&self) -> DbResult<Vec<Promotion>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn).await
    }

    /// Promotions in effect at `at`, newest first.
    pub async fn active_at(&self, at: DateTime<Utc>) -> DbResult<Vec<Promotion>> {
        let mut conn = self.pool.acquire().await?;
        active_at(&mut conn, at).await
    }

    /// Inserts a promotion and its product set atomically.
    pub async fn insert(&self, promotion: &Promotion) -> DbResult<Promotion> {
        validate_discount_bps(promotion.discount_bps).map_err(CoreError::from)?;

        let mut promotion = promotion.clone();
        if promotion.id.is_empty() {
            promotion.id = Uuid::new_v4().to_string();
        }

        debug!(
            id = %promotion.id,
            discount_bps = promotion.discount_bps,
            products = promotion.product_ids.len(),
            "Inserting promotion"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, description, discount_bps, start_date, end_date, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&promotion.id)
        .bind(&promotion.description)
        .bind(promotion.discount_bps as i64)
        .bind(promotion.start_date)
        .bind(promotion.end_date)
        .bind(promotion.is_active)
        .bind(promotion.created_at)
        .execute(&mut *tx)
        .await?;

        for product_id in &promotion.product_ids {
            sqlx::query("INSERT INTO promotion_products (promotion_id, product_id) VALUES (?1, ?2)")
                .bind(&promotion.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(promotion)
    }
}

pub(crate) async fn list(conn: &mut SqliteConnection) -> DbResult<Vec<Promotion>> {
    let rows = sqlx::query_as::<_, PromotionRow>(
        "SELECT * FROM promotions ORDER BY created_at DESC, id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    let links: Vec<(String, String)> = sqlx::query_as(
        "SELECT promotion_id, product_id FROM promotion_products ORDER BY product_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut products: HashMap<String, Vec<String>> = HashMap::new();
    for (promotion_id, product_id) in links {
        products.entry(promotion_id).or_default().push(product_id);
    }

    rows.into_iter()
        .map(|row| {
            let ids = products.remove(&row.id).unwrap_or_default();
            row.into_promotion(ids)
        })
        .collect()
}

pub(crate) async fn active_at(
    conn: &mut SqliteConnection,
    at: DateTime<Utc>,
) -> DbResult<Vec<Promotion>> {
    let all = list(conn).await?;
    Ok(active_promotions(&all, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plain_product, promotion, test_db};
    use chrono::Duration;

    #[tokio::test]
    async fn test_insert_and_read_back_product_set() {
        let db = test_db().await;
        let a = db.products().insert(&plain_product("A", 100, 1)).await.unwrap();
        let b = db.products().insert(&plain_product("B", 100, 1)).await.unwrap();

        let promo = promotion(1000, vec![a.id.clone(), b.id.clone()], Utc::now());
        db.promotions().insert(&promo).await.unwrap();

        let all = db.promotions().list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].discount_bps, 1000);
        assert!(all[0].applies_to(&a.id));
        assert!(all[0].applies_to(&b.id));
    }

    #[tokio::test]
    async fn test_active_at_orders_newest_first_and_filters() {
        let db = test_db().await;
        let a = db.products().insert(&plain_product("A", 100, 1)).await.unwrap();
        let now = Utc::now();

        let mut older = promotion(1000, vec![a.id.clone()], now - Duration::days(2));
        older.created_at = now - Duration::days(2);
        let mut newer = promotion(2500, vec![a.id.clone()], now - Duration::days(1));
        newer.created_at = now - Duration::days(1);
        let mut expired = promotion(5000, vec![a.id.clone()], now - Duration::days(10));
        expired.end_date = Some(now - Duration::days(5));
        let mut disabled = promotion(7500, vec![a.id.clone()], now - Duration::days(1));
        disabled.is_active = false;

        for p in [&older, &newer, &expired, &disabled] {
            db.promotions().insert(p).await.unwrap();
        }

        let active = db.promotions().active_at(now).await.unwrap();
        let rates: Vec<u32> = active.iter().map(|p| p.discount_bps).collect();
        assert_eq!(rates, vec![2500, 1000]);
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_discount() {
        let db = test_db().await;
        let promo = promotion(10_001, vec![], Utc::now());
        let err = db.promotions().insert(&promo).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }
}
