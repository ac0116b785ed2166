//! # Inventory Manager
//!
//! The stateful half of lot management: receiving stock, breaking cases into
//! eaches, and the two stock reports. Sale consumption and refund restoration
//! happen inside the ledger's commit, not here.
//!
//! ## Case Break
//! ```text
//! CASE-SODA-24 (stock 3, contains SODA × 24)
//!      │
//!      │ break_case(CASE-SODA-24, 2)
//!      ▼
//! ┌──────────────────────── one transaction ────────────────────────┐
//! │ CASE-SODA-24.stock_quantity   3 → 1      (guarded decrement)    │
//! │ new lot for SODA: 48 received, 48 remaining, no expiration      │
//! │ SODA.stock_quantity          10 → 58                            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use basket_core::inventory::{plan_case_break, CaseBreakPlan};
use basket_core::validation::{validate_id, validate_stock_quantity};
use basket_core::{InventoryLot, Product};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::LedgerSettings;
use crate::error::{DbError, DbResult};
use crate::repository::lot::{self, ExpiringLot, LotRepository};
use crate::repository::product::{self, ProductRepository};
use crate::retry::{with_retry, RetryPolicy};

/// Result of a committed case break.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseBreak {
    pub plan: CaseBreakPlan,
    /// The each-product lot the break created.
    pub lot: InventoryLot,
}

#[derive(Debug, Clone)]
pub struct InventoryManager {
    pool: SqlitePool,
    settings: LedgerSettings,
    retry: RetryPolicy,
}

impl InventoryManager {
    pub fn new(pool: SqlitePool, settings: LedgerSettings, retry: RetryPolicy) -> Self {
        InventoryManager {
            pool,
            settings,
            retry,
        }
    }

    /// Records a delivery: one new lot plus the same amount on the product's
    /// on-hand counter.
    pub async fn receive_stock(
        &self,
        product_id: &str,
        quantity: i64,
        expiration_date: Option<NaiveDate>,
    ) -> DbResult<InventoryLot> {
        validate_id("product_id", product_id)?;
        validate_stock_quantity("quantity", quantity)?;

        with_retry(&self.retry, "receive_stock", || {
            self.try_receive_stock(product_id, quantity, expiration_date)
        })
        .await
    }

    async fn try_receive_stock(
        &self,
        product_id: &str,
        quantity: i64,
        expiration_date: Option<NaiveDate>,
    ) -> DbResult<InventoryLot> {
        let mut tx = self.pool.begin().await?;

        let product = product::require(&mut *tx, product_id).await?;
        let lot = lot::insert(&mut *tx, &product.id, quantity, expiration_date).await?;
        product::increment_stock(&mut *tx, &product.id, quantity).await?;

        tx.commit().await?;

        info!(
            sku = %product.sku,
            quantity,
            lot_id = %lot.id,
            ?expiration_date,
            "Stock received"
        );
        Ok(lot)
    }

    /// Converts `cases` units of a case product into eaches of the product
    /// it contains.
    ///
    /// The new each-lot carries no expiration date.
    pub async fn break_case(&self, case_product_id: &str, cases: i64) -> DbResult<CaseBreak> {
        validate_id("case_product_id", case_product_id)?;
        validate_stock_quantity("number of cases", cases)?;

        with_retry(&self.retry, "break_case", || {
            self.try_break_case(case_product_id, cases)
        })
        .await
    }

    async fn try_break_case(&self, case_product_id: &str, cases: i64) -> DbResult<CaseBreak> {
        let mut tx = self.pool.begin().await?;

        let case = product::require(&mut *tx, case_product_id).await?;
        let plan = plan_case_break(&case, cases)?;
        let each = product::require(&mut *tx, &plan.each_product_id).await?;

        product::decrement_stock(&mut *tx, &case.id, &case.sku, plan.cases).await?;
        let lot = lot::insert(&mut *tx, &each.id, plan.eaches, None).await?;
        product::increment_stock(&mut *tx, &each.id, plan.eaches).await?;

        tx.commit().await?;

        info!(
            case_sku = %case.sku,
            each_sku = %each.sku,
            cases = plan.cases,
            eaches = plan.eaches,
            "Case broken"
        );
        Ok(CaseBreak { plan, lot })
    }

    /// Products at or under the configured low-stock threshold, excluding
    /// those already at zero.
    pub async fn low_stock(&self, limit: u32) -> DbResult<Vec<Product>> {
        ProductRepository::new(self.pool.clone())
            .low_stock(self.settings.low_stock_threshold, limit)
            .await
    }

    /// Lots expiring within the configured window starting at `as_of`.
    pub async fn expiring_lots(&self, as_of: NaiveDate) -> DbResult<Vec<ExpiringLot>> {
        let until = as_of
            .checked_add_signed(Duration::days(self.settings.expiration_window_days))
            .ok_or_else(|| {
                DbError::Config(format!(
                    "expiration window of {} days is out of range",
                    self.settings.expiration_window_days
                ))
            })?;

        LotRepository::new(self.pool.clone())
            .expiring_between(as_of, until)
            .await
    }

    pub async fn lots_for(&self, product_id: &str) -> DbResult<Vec<InventoryLot>> {
        LotRepository::new(self.pool.clone()).for_product(product_id).await
    }
}
