//! # Deli Token Issuer
//!
//! The deli counter weighs and prices an order up front and prints a token.
//! At the register the token scans like a barcode and becomes one pre-priced
//! line, exactly once.
//!
//! ```text
//! Deli counter                          Register
//! ────────────                          ────────
//! issue(HAM, 1.250 lb) ──► token T      scan T ──► resolve(T)
//!   price 899 × 1.250 = 1124¢                       │
//!   is_fulfilled = 0                                ├─ flip 0 → 1 ──► DeliToken line (1124¢, qty 1)
//!                                                   └─ already 1   ──► TokenReplay
//! ```

use basket_core::validation::{validate_id, validate_weight};
use basket_core::{Cart, CartLineSource, CoreError, DeliOrder, ValidationError, Weight};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use crate::repository::{deli, product};
use crate::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct DeliTokenIssuer {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl DeliTokenIssuer {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        DeliTokenIssuer { pool, retry }
    }

    /// Prices `weight` of a weighed product and persists an unfulfilled token.
    pub async fn issue(&self, product_id: &str, weight: Weight) -> DbResult<DeliOrder> {
        validate_id("product_id", product_id)?;
        validate_weight(weight)?;

        with_retry(&self.retry, "issue_deli_token", || self.try_issue(product_id, weight)).await
    }

    async fn try_issue(&self, product_id: &str, weight: Weight) -> DbResult<DeliOrder> {
        let mut tx = self.pool.begin().await?;

        let product = product::require(&mut *tx, product_id).await?;
        if !product.is_weighed {
            return Err(ValidationError::InvalidFormat {
                field: "product".to_string(),
                reason: format!("{} is not sold by weight", product.sku),
            }
            .into());
        }

        let order = DeliOrder {
            id: Uuid::new_v4().to_string(),
            base_product_id: product.id.clone(),
            weight_milli: weight.milli(),
            total_price_cents: product.price().checked_multiply_weight(weight)?.cents(),
            is_fulfilled: false,
            created_at: Utc::now(),
            fulfilled_at: None,
        };
        deli::insert(&mut *tx, &order).await?;

        tx.commit().await?;

        info!(
            token = %order.id,
            sku = %product.sku,
            weight = %weight,
            total_cents = order.total_price_cents,
            "Deli token issued"
        );
        Ok(order)
    }

    pub async fn get(&self, token: &str) -> DbResult<Option<DeliOrder>> {
        let mut conn = self.pool.acquire().await?;
        deli::fetch(&mut conn, token).await
    }

    /// Fulfils a token and returns it as a pre-priced cart line.
    ///
    /// Fails with `TokenReplay` if the token was already fulfilled and
    /// `NotFound` if it was never issued.
    ///
    /// The token is spent here, not at commit. A cart that then refuses the
    /// line leaves the sticker unusable; scanning through
    /// [`DeliTokenIssuer::scan_into`] checks the cart first.
    pub async fn resolve(&self, token: &str) -> DbResult<CartLineSource> {
        validate_id("token", token)?;

        with_retry(&self.retry, "resolve_deli_token", || self.try_resolve(token)).await
    }

    async fn try_resolve(&self, token: &str) -> DbResult<CartLineSource> {
        let mut tx = self.pool.begin().await?;

        if !deli::fulfill(&mut *tx, token, Utc::now()).await? {
            let err = match deli::fetch(&mut *tx, token).await? {
                Some(_) => CoreError::TokenReplay {
                    token: token.to_string(),
                },
                None => CoreError::not_found("Deli order", token),
            };
            return Err(err.into());
        }

        let order = deli::fetch(&mut *tx, token)
            .await?
            .ok_or_else(|| DbError::Internal(format!("deli order {token} vanished after fulfilment")))?;
        let product = product::require(&mut *tx, &order.base_product_id).await?;

        tx.commit().await?;

        info!(token, sku = %product.sku, "Deli token fulfilled");
        Ok(CartLineSource::DeliToken { order, product })
    }

    /// Resolves a scanned code: a deli token first, then a product barcode.
    ///
    /// A replayed token whose code is not also a barcode still reports
    /// `TokenReplay`, so the cashier sees why the scan was refused.
    pub async fn resolve_scan(&self, code: &str) -> DbResult<CartLineSource> {
        let replay = match self.resolve(code).await {
            Ok(source) => return Ok(source),
            Err(DbError::Domain(err @ CoreError::TokenReplay { .. })) => Some(err),
            Err(DbError::Domain(CoreError::NotFound { .. })) => None,
            Err(err) => return Err(err),
        };

        debug!(code, "Not a live deli token, trying barcode");

        match ProductRepository::new(self.pool.clone()).get_by_barcode(code).await? {
            Some(product) => Ok(CartLineSource::Catalog(product)),
            None => Err(replay
                .unwrap_or_else(|| CoreError::not_found("Product", code))
                .into()),
        }
    }

    /// Scans `code` into `cart`.
    ///
    /// A cart in return mode or with a pending selection is refused before
    /// any token is spent. An age-restricted token still moves the cart to
    /// awaiting verification; cancelling that does not restore the token.
    pub async fn scan_into(&self, cart: &Cart, code: &str) -> DbResult<Cart> {
        cart.check_accepts_scan()?;
        let source = self.resolve_scan(code).await?;
        Ok(cart.add_item(source)?)
    }
}
