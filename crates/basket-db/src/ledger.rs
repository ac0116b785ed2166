//! # Ledger
//!
//! The transaction commit protocol: the only writer of transactions, stock
//! counters, lot quantities, loyalty points and refund links.
//!
//! ## Sale Commit
//! ```text
//! SaleRequest (lines + tender + quoted totals)
//!      │
//!      ▼  with_retry ───────────────────────────────────────────────┐
//! ┌─────────────────────────── one transaction ───────────────────┐ │
//! │ 1. re-price every line from the catalog / deli token          │ │
//! │ 2. price() against promotions active now, compare with quote  │ │
//! │ 3. settle tender: cash needs tendered ≥ total, computes change│ │
//! │ 4. insert transaction + item snapshots                        │ │
//! │ 5. credit floor(total) loyalty points                         │ │
//! │ 6. per unit line: FEFO lot draws, guarded stock decrement     │ │
//! └──────────────────────────────┬────────────────────────────────┘ │
//!                                │ Conflict (busy / lost race) ─────┘
//!                                ▼
//!                           Transaction
//! ```
//!
//! ## Refund Commit
//! The origin is re-read inside the transaction: it must exist, must not be a
//! refund itself, and must not already be refunded. Lines are matched against
//! the origin's snapshots and priced at the price actually charged. Stock is
//! restored to the product counter only; lot quantities are not rebuilt.
//!
//! Any error inside the transaction drops it, which rolls everything back.

use std::collections::{HashMap, HashSet};

use basket_core::inventory::plan_fefo;
use basket_core::pricing::verify_quote;
use basket_core::validation::{validate_id, validate_quantity, validate_weight};
use basket_core::{
    price, Cart, CartItem, CartTotals, CommitLine, CommitRequest, CoreError, CoreResult,
    Money, PricedCart, PricingMode, Product, RefundRequest, SaleRequest, TenderType,
    Transaction, TransactionItem, ValidationError, Weight, MAX_CART_ITEMS,
};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::LedgerSettings;
use crate::error::{DbError, DbResult};
use crate::repository::{customer, deli, lot, product, promotion, transaction};
use crate::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
    settings: LedgerSettings,
    retry: RetryPolicy,
}

impl Ledger {
    pub fn new(pool: SqlitePool, settings: LedgerSettings, retry: RetryPolicy) -> Self {
        Ledger {
            pool,
            settings,
            retry,
        }
    }

    /// An empty sale cart priced with the configured tax rate and the
    /// promotions active at `at`, gated at the configured minimum age.
    pub async fn start_cart(&self, at: DateTime<Utc>) -> DbResult<Cart> {
        let mut conn = self.pool.acquire().await?;
        let promotions = promotion::active_at(&mut conn, at).await?;
        Ok(Cart::new(self.settings.tax_rate, promotions).with_minimum_age(self.settings.minimum_age))
    }

    /// A return-mode cart loaded with the refundable lines of `transaction_id`.
    pub async fn start_return(&self, transaction_id: &str) -> DbResult<Cart> {
        let items = self.lookup_for_return(transaction_id).await?;
        Ok(Cart::new(self.settings.tax_rate, Vec::new())
            .with_minimum_age(self.settings.minimum_age)
            .load_return_items(items, transaction_id))
    }

    /// The negated lines of a committed sale, priced as they were charged.
    ///
    /// Fails with `NotFound`, `RefundChain` or `DuplicateRefund` before any
    /// return cart is built.
    pub async fn lookup_for_return(&self, transaction_id: &str) -> DbResult<Vec<CartItem>> {
        validate_id("transaction_id", transaction_id)?;

        let mut conn = self.pool.acquire().await?;
        let origin = refundable_origin(&mut conn, transaction_id).await?;

        Ok(origin.items.iter().map(CartItem::from_return_snapshot).collect())
    }

    /// Commits whatever [`Cart::to_commit_request`] produced.
    pub async fn commit(&self, request: &CommitRequest) -> DbResult<Transaction> {
        match request {
            CommitRequest::Sale(sale) => self.commit_sale(sale).await,
            CommitRequest::Refund(refund) => self.commit_refund(refund).await,
        }
    }

    // -------------------------------------------------------------------------
    // Sale
    // -------------------------------------------------------------------------

    pub async fn commit_sale(&self, request: &SaleRequest) -> DbResult<Transaction> {
        check_line_count(&request.lines)?;
        if let Some(customer_id) = &request.customer_id {
            validate_id("customer_id", customer_id)?;
        }
        if request.amount_tendered_cents.is_some_and(|cents| cents < 0) {
            return Err(CoreError::InvalidPayment {
                reason: "amount tendered cannot be negative".to_string(),
            }
            .into());
        }

        with_retry(&self.retry, "commit_sale", || self.try_commit_sale(request)).await
    }

    async fn try_commit_sale(&self, request: &SaleRequest) -> DbResult<Transaction> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let items = resolve_sale_lines(&mut *tx, &request.lines).await?;
        let promotions = promotion::active_at(&mut *tx, now).await?;
        let priced = price(&items, &promotions, PricingMode::Sale, self.settings.tax_rate);
        check_quote(request.quoted.as_ref(), &priced.totals)?;

        if priced.totals.is_refund() {
            return Err(CoreError::cart("sale total must not be negative").into());
        }

        let total = priced.totals.total();
        let (amount_tendered, change) =
            settle_payment(request.tender_type, request.amount_tendered_cents, total)?;

        if let Some(customer_id) = &request.customer_id {
            if customer::fetch(&mut *tx, customer_id).await?.is_none() {
                return Err(CoreError::not_found("Customer", customer_id).into());
            }
        }

        let id = Uuid::new_v4().to_string();
        let record = Transaction {
            items: snapshot(&id, &items, &priced),
            id,
            subtotal_cents: priced.totals.subtotal_cents,
            discount_cents: priced.totals.discount_cents,
            tax_cents: priced.totals.tax_cents,
            total_cents: priced.totals.total_cents,
            tender_type: request.tender_type,
            amount_tendered_cents: amount_tendered,
            change_given_cents: change.cents(),
            customer_id: request.customer_id.clone(),
            refunded_by_id: None,
            refund_of_id: None,
            created_at: now,
        };
        transaction::insert(&mut *tx, &record).await?;

        if let Some(customer_id) = &record.customer_id {
            let points = total.floor_dollars();
            if points > 0 {
                customer::credit_points(&mut *tx, customer_id, points).await?;
            }
        }

        for item in items.iter().filter(|item| item.is_unit_line()) {
            consume(&mut *tx, item).await?;
        }

        tx.commit().await?;

        info!(
            id = %record.id,
            total = %total,
            lines = record.items.len(),
            tender = ?record.tender_type,
            "Sale committed"
        );
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Refund
    // -------------------------------------------------------------------------

    pub async fn commit_refund(&self, request: &RefundRequest) -> DbResult<Transaction> {
        validate_id("original_transaction_id", &request.original_transaction_id)?;
        check_line_count(&request.lines)?;

        with_retry(&self.retry, "commit_refund", || self.try_commit_refund(request)).await
    }

    async fn try_commit_refund(&self, request: &RefundRequest) -> DbResult<Transaction> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let origin = refundable_origin(&mut *tx, &request.original_transaction_id).await?;
        let items = resolve_refund_lines(&origin, &request.lines)?;
        let priced = price(&items, &[], PricingMode::Return, self.settings.tax_rate);
        check_quote(request.quoted.as_ref(), &priced.totals)?;

        if !priced.totals.is_refund() {
            return Err(CoreError::cart("refund total must be negative").into());
        }

        let id = Uuid::new_v4().to_string();
        let record = Transaction {
            items: snapshot(&id, &items, &priced),
            id,
            subtotal_cents: priced.totals.subtotal_cents,
            discount_cents: priced.totals.discount_cents,
            tax_cents: priced.totals.tax_cents,
            total_cents: priced.totals.total_cents,
            tender_type: request.tender_type,
            amount_tendered_cents: None,
            change_given_cents: 0,
            customer_id: None,
            refunded_by_id: None,
            refund_of_id: Some(origin.id.clone()),
            created_at: now,
        };
        transaction::insert(&mut *tx, &record).await?;

        if !transaction::link_refund(&mut *tx, &origin.id, &record.id).await? {
            return Err(DbError::conflict(format!(
                "transaction {} was refunded concurrently",
                origin.id
            )));
        }

        for item in items.iter().filter(|item| item.is_unit_line()) {
            product::increment_stock(&mut *tx, &item.product_id, item.quantity.abs()).await?;
        }

        tx.commit().await?;

        info!(
            id = %record.id,
            origin = %origin.id,
            total = %record.total(),
            "Refund committed"
        );
        Ok(record)
    }
}

// =============================================================================
// Commit steps
// =============================================================================

fn check_line_count(lines: &[CommitLine]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }
    if lines.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        }
        .into());
    }
    Ok(())
}

fn check_quote(quoted: Option<&CartTotals>, computed: &CartTotals) -> CoreResult<()> {
    match quoted {
        Some(quoted) => verify_quote(quoted, computed),
        None => Ok(()),
    }
}

/// Rebuilds sale lines from authoritative catalog and token state.
async fn resolve_sale_lines(conn: &mut SqliteConnection, lines: &[CommitLine]) -> DbResult<Vec<CartItem>> {
    let mut tokens = HashSet::new();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        let product = product::require(conn, &line.product_id).await?;

        let item = match (&line.deli_order_id, line.weight_milli) {
            (Some(token), _) => {
                if !tokens.insert(token.as_str()) {
                    return Err(CoreError::TokenReplay {
                        token: token.clone(),
                    }
                    .into());
                }
                resolve_deli_line(conn, line, token, &product).await?
            }
            (None, Some(milli)) => {
                if !product.is_weighed {
                    return Err(CoreError::cart(format!("{} is not sold by weight", product.sku)).into());
                }
                if line.quantity != 1 {
                    return Err(CoreError::cart("weighed lines carry quantity 1").into());
                }
                let weight = Weight::from_milli(milli);
                validate_weight(weight)?;
                product.price().checked_multiply_weight(weight)?;
                CartItem::from_weighed(&product, weight)
            }
            (None, None) => {
                if product.is_weighed {
                    return Err(CoreError::cart(format!("{} must be weighed", product.sku)).into());
                }
                validate_quantity(line.quantity)?;
                CartItem::from_product(&product, line.quantity)
            }
        };
        items.push(item);
    }

    Ok(items)
}

/// A deli line is valid once its token has been scanned and never sold.
async fn resolve_deli_line(
    conn: &mut SqliteConnection,
    line: &CommitLine,
    token: &str,
    product: &Product,
) -> DbResult<CartItem> {
    let order = deli::fetch(conn, token)
        .await?
        .ok_or_else(|| CoreError::not_found("Deli order", token))?;

    if order.base_product_id != product.id {
        return Err(CoreError::cart(format!("deli token {token} is not for {}", product.sku)).into());
    }
    if line.quantity != 1 || line.weight_milli.is_some() {
        return Err(CoreError::cart("deli lines carry quantity 1 and no weight").into());
    }
    if !order.is_fulfilled {
        return Err(CoreError::cart(format!("deli token {token} has not been scanned")).into());
    }
    if transaction::deli_order_sold(conn, token).await? {
        return Err(CoreError::TokenReplay {
            token: token.to_string(),
        }
        .into());
    }

    Ok(CartItem::from_deli_order(&order, product))
}

fn settle_payment(
    tender: TenderType,
    amount_tendered_cents: Option<i64>,
    total: Money,
) -> CoreResult<(Option<i64>, Money)> {
    match tender {
        TenderType::Cash => {
            let tendered = amount_tendered_cents
                .map(Money::from_cents)
                .ok_or_else(|| CoreError::InvalidPayment {
                    reason: "cash sale requires an amount tendered".to_string(),
                })?;
            if tendered < total {
                return Err(CoreError::InvalidPayment {
                    reason: format!("tendered {tendered} is less than total {total}"),
                });
            }
            Ok((Some(tendered.cents()), tendered - total))
        }
        TenderType::Card => Ok((amount_tendered_cents, Money::zero())),
    }
}

/// Immutable line snapshots, in cart order.
fn snapshot(transaction_id: &str, items: &[CartItem], priced: &PricedCart) -> Vec<TransactionItem> {
    items
        .iter()
        .zip(&priced.lines)
        .enumerate()
        .map(|(position, (item, line))| TransactionItem {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.to_string(),
            position: position as i64,
            product_id: item.product_id.clone(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            price_cents: item.unit_price_cents,
            cost_cents: item.cost_cents,
            quantity: item.quantity,
            weight_milli: item.weight_milli,
            discount_cents: line.discount_cents,
            line_total_cents: line.line_total_cents,
            deli_order_id: item.deli_order_id.clone(),
        })
        .collect()
}

/// FEFO lot draws for one unit line, then the aggregate counter.
async fn consume(conn: &mut SqliteConnection, item: &CartItem) -> DbResult<()> {
    let lots = lot::open_lots(conn, &item.product_id).await?;
    let draws = plan_fefo(&item.sku, &lots, item.quantity)?;

    for draw in &draws {
        lot::draw(conn, &draw.lot_id, draw.quantity).await?;
    }
    product::decrement_stock(conn, &item.product_id, &item.sku, item.quantity).await?;

    debug!(sku = %item.sku, quantity = item.quantity, lots = draws.len(), "Stock consumed");
    Ok(())
}

/// Loads a transaction that may still be refunded.
async fn refundable_origin(conn: &mut SqliteConnection, transaction_id: &str) -> DbResult<Transaction> {
    let origin = transaction::fetch(conn, transaction_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Transaction", transaction_id))?;

    if origin.is_refund() {
        return Err(CoreError::RefundChain {
            transaction_id: origin.id,
        }
        .into());
    }
    if let Some(refunded_by) = origin.refunded_by_id {
        return Err(CoreError::DuplicateRefund {
            transaction_id: origin.id,
            refunded_by,
        }
        .into());
    }
    Ok(origin)
}

type LineKey<'a> = (&'a str, Option<i64>, Option<&'a str>);

/// Matches refund lines to the origin's snapshots.
///
/// Each line must name a product/weight/token combination the origin sold,
/// and the total returned per combination may not exceed what was sold.
fn resolve_refund_lines(origin: &Transaction, lines: &[CommitLine]) -> CoreResult<Vec<CartItem>> {
    let mut sold: HashMap<LineKey<'_>, (i64, &TransactionItem)> = HashMap::new();
    for item in &origin.items {
        let key = (item.product_id.as_str(), item.weight_milli, item.deli_order_id.as_deref());
        sold.entry(key).or_insert((0, item)).0 += item.quantity.abs();
    }

    let mut returned: HashMap<LineKey<'_>, i64> = HashMap::new();
    let mut items = Vec::with_capacity(lines.len());

    for line in lines {
        let quantity = line
            .quantity
            .checked_neg()
            .filter(|q| *q > 0)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: "refund lines carry negative quantities".to_string(),
            })?;
        validate_quantity(quantity)?;

        let key = (line.product_id.as_str(), line.weight_milli, line.deli_order_id.as_deref());
        let Some(&(sold_quantity, original)) = sold.get(&key) else {
            return Err(CoreError::not_found(
                "Transaction line",
                format!("{}:{}", origin.id, line.product_id),
            ));
        };

        if original.weight_milli.is_some() || original.deli_order_id.is_some() {
            if quantity != 1 {
                return Err(CoreError::cart("weighed and deli lines are returned one at a time"));
            }
        }

        let total = returned.entry(key).or_insert(0);
        *total += quantity;
        if *total > sold_quantity {
            return Err(ValidationError::OutOfRange {
                field: format!("returned quantity of {}", original.sku),
                min: 1,
                max: sold_quantity,
            }
            .into());
        }

        let mut item = CartItem::from_return_snapshot(original);
        item.quantity = line.quantity;
        items.push(item);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::ErrorCode;
    use crate::pool::Database;
    use crate::test_support::{
        cash_sale, file_db, plain_product, promotion, stocked, test_db, weighed_product,
    };
    use basket_core::{CartLineSource, TaxRate, MAX_WEIGHT_MILLI};
    use chrono::{Duration, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn unit(product: &Product, quantity: i64) -> CommitLine {
        CartItem::from_product(product, quantity).to_commit_line()
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock_quantity
    }

    #[tokio::test]
    async fn test_sale_with_promotion_and_tax() {
        let db = test_db().await;
        let cheese = stocked(&db, "CHEESE", 1000, &[(5, None)]).await;
        db.promotions()
            .insert(&promotion(1000, vec![cheese.id.clone()], Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let cart = db
            .ledger()
            .start_cart(Utc::now())
            .await
            .unwrap()
            .add_item(CartLineSource::Catalog(cheese.clone()))
            .unwrap()
            .add_item(CartLineSource::Catalog(cheese.clone()))
            .unwrap();
        assert_eq!(cart.totals().total_cents, 1944);

        let request = cart.to_commit_request(TenderType::Cash, Some(2000), None).unwrap();
        let sale = db.ledger().commit(&request).await.unwrap();

        assert_eq!(sale.subtotal_cents, 2000);
        assert_eq!(sale.discount_cents, 200);
        assert_eq!(sale.tax_cents, 144);
        assert_eq!(sale.total_cents, 1944);
        assert_eq!(sale.change_given_cents, 56);
        assert_eq!(sale.items[0].discount_cents, 200);
        assert_eq!(stock_of(&db, &cheese.id).await, 3);

        let stored = db.transactions().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items, sale.items);
        assert_eq!(stored.tender_type, TenderType::Cash);
        assert_eq!(stored.amount_tendered_cents, Some(2000));
    }

    #[tokio::test]
    async fn test_sale_draws_lots_fefo() {
        let db = test_db().await;
        let milk = stocked(
            &db,
            "MILK",
            349,
            &[(5, Some(date(2024, 2, 1))), (3, Some(date(2024, 1, 1)))],
        )
        .await;

        db.ledger()
            .commit_sale(&cash_sale(vec![unit(&milk, 4)], 10_000))
            .await
            .unwrap();

        let lots = db.inventory().lots_for(&milk.id).await.unwrap();
        let remaining: Vec<_> = lots
            .iter()
            .map(|l| (l.expiration_date, l.quantity_remaining))
            .collect();
        assert_eq!(
            remaining,
            vec![(Some(date(2024, 1, 1)), 0), (Some(date(2024, 2, 1)), 4)]
        );
        assert_eq!(stock_of(&db, &milk.id).await, 4);
    }

    #[tokio::test]
    async fn test_lot_shortfall_rolls_back_everything() {
        let db = test_db().await;
        let eggs = db.products().insert(&plain_product("EGGS", 299, 7)).await.unwrap();
        db.inventory().receive_stock(&eggs.id, 3, None).await.unwrap();
        let alice = db.customers().create("Alice").await.unwrap();

        let mut request = cash_sale(vec![unit(&eggs, 5)], 10_000);
        request.customer_id = Some(alice.id.clone());
        let err = db.ledger().commit_sale(&request).await.unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));
        assert_eq!(stock_of(&db, &eggs.id).await, 10);
        assert!(db.transactions().recent(10).await.unwrap().is_empty());
        let alice = db.customers().get_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(alice.loyalty_points, 0);
    }

    #[tokio::test]
    async fn test_loyalty_points_are_floored_dollars() {
        let db = test_db().await.with_settings(LedgerSettings {
            tax_rate: TaxRate::from_bps(0),
            ..LedgerSettings::default()
        });
        let bread = stocked(&db, "BREAD", 1999, &[(5, None)]).await;
        let alice = db.customers().create("Alice").await.unwrap();

        let mut request = cash_sale(vec![unit(&bread, 1)], 2000);
        request.customer_id = Some(alice.id.clone());
        db.ledger().commit_sale(&request).await.unwrap();

        let alice = db.customers().get_by_id(&alice.id).await.unwrap().unwrap();
        assert_eq!(alice.loyalty_points, 19);
    }

    #[tokio::test]
    async fn test_unknown_customer_rejected() {
        let db = test_db().await;
        let bread = stocked(&db, "BREAD", 199, &[(5, None)]).await;

        let mut request = cash_sale(vec![unit(&bread, 1)], 1000);
        request.customer_id = Some("ghost".to_string());
        let err = db.ledger().commit_sale(&request).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(stock_of(&db, &bread.id).await, 5);
    }

    #[tokio::test]
    async fn test_cash_underpayment_and_card_change() {
        let db = test_db().await;
        let bread = stocked(&db, "BREAD", 1000, &[(5, None)]).await;

        let err = db
            .ledger()
            .commit_sale(&cash_sale(vec![unit(&bread, 1)], 500))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidPayment { .. })));

        let mut card = cash_sale(vec![unit(&bread, 1)], 0);
        card.tender_type = TenderType::Card;
        card.amount_tendered_cents = None;
        let sale = db.ledger().commit_sale(&card).await.unwrap();
        assert_eq!(sale.change_given_cents, 0);
        assert_eq!(sale.total_cents, 1080);
    }

    #[tokio::test]
    async fn test_tampered_quote_is_rejected() {
        let db = test_db().await;
        let bread = stocked(&db, "BREAD", 1000, &[(5, None)]).await;

        let mut request = cash_sale(vec![unit(&bread, 1)], 5000);
        request.quoted = Some(CartTotals {
            subtotal_cents: 1,
            discount_cents: 0,
            tax_cents: 0,
            total_cents: 1,
        });
        let err = db.ledger().commit_sale(&request).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::PricingMismatch);
        assert_eq!(stock_of(&db, &bread.id).await, 5);
    }

    #[tokio::test]
    async fn test_weighed_and_deli_lines_skip_stock() {
        let db = test_db().await;
        let apples = db.products().insert(&weighed_product("APPLES", 199)).await.unwrap();
        let ham = db.products().insert(&weighed_product("HAM", 899)).await.unwrap();
        let order = db.deli().issue(&ham.id, Weight::from_milli(1250)).await.unwrap();
        let CartLineSource::DeliToken { order, product } = db.deli().resolve(&order.id).await.unwrap()
        else {
            panic!("expected deli line");
        };

        let lines = vec![
            CartItem::from_weighed(&apples, Weight::from_milli(2000)).to_commit_line(),
            CartItem::from_deli_order(&order, &product).to_commit_line(),
        ];
        let sale = db.ledger().commit_sale(&cash_sale(lines, 10_000)).await.unwrap();

        assert_eq!(sale.subtotal_cents, 398 + 1124);
        assert_eq!(sale.items[1].deli_order_id.as_deref(), Some(order.id.as_str()));
        assert_eq!(stock_of(&db, &apples.id).await, 0);
    }

    #[tokio::test]
    async fn test_deli_token_cannot_be_sold_twice() {
        let db = test_db().await;
        let ham = db.products().insert(&weighed_product("HAM", 899)).await.unwrap();
        let order = db.deli().issue(&ham.id, Weight::from_milli(500)).await.unwrap();
        let line = CommitLine {
            product_id: ham.id.clone(),
            quantity: 1,
            weight_milli: None,
            deli_order_id: Some(order.id.clone()),
        };

        let err = db
            .ledger()
            .commit_sale(&cash_sale(vec![line.clone()], 10_000))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CartError);

        db.deli().resolve(&order.id).await.unwrap();
        db.ledger()
            .commit_sale(&cash_sale(vec![line.clone()], 10_000))
            .await
            .unwrap();

        let err = db
            .ledger()
            .commit_sale(&cash_sale(vec![line], 10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TokenReplay { .. })));
    }

    #[tokio::test]
    async fn test_refund_restores_stock_and_links_origin() {
        let db = test_db().await;
        let soda = stocked(&db, "SODA", 125, &[(10, None)]).await;
        let sale = db
            .ledger()
            .commit_sale(&cash_sale(vec![unit(&soda, 3)], 1000))
            .await
            .unwrap();

        let cart = db.ledger().start_return(&sale.id).await.unwrap();
        assert_eq!(cart.mode(), PricingMode::Return);
        assert_eq!(cart.items()[0].quantity, -3);
        assert_eq!(cart.totals().tax_cents, 0);

        let request = cart.to_commit_request(TenderType::Cash, None, None).unwrap();
        assert!(matches!(request, CommitRequest::Refund(_)));
        let refund = db.ledger().commit(&request).await.unwrap();

        assert_eq!(refund.total_cents, -375);
        assert!(refund.is_refund());
        assert_eq!(refund.refund_of_id.as_deref(), Some(sale.id.as_str()));
        assert_eq!(stock_of(&db, &soda.id).await, 10);

        let origin = db.transactions().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(origin.refunded_by_id.as_deref(), Some(refund.id.as_str()));

        // lots are not rebuilt
        let lots = db.inventory().lots_for(&soda.id).await.unwrap();
        assert_eq!(lots[0].quantity_remaining, 7);
    }

    #[tokio::test]
    async fn test_second_refund_and_refund_of_refund_fail() {
        let db = test_db().await;
        let soda = stocked(&db, "SODA", 125, &[(10, None)]).await;
        let sale = db
            .ledger()
            .commit_sale(&cash_sale(vec![unit(&soda, 2)], 1000))
            .await
            .unwrap();

        let request = RefundRequest {
            lines: vec![CommitLine {
                quantity: -2,
                ..unit(&soda, 2)
            }],
            tender_type: TenderType::Cash,
            original_transaction_id: sale.id.clone(),
            quoted: None,
        };
        let refund = db.ledger().commit_refund(&request).await.unwrap();

        let err = db.ledger().commit_refund(&request).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::DuplicateRefund { .. })));
        let err = db.ledger().lookup_for_return(&sale.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRefund);

        let err = db.ledger().lookup_for_return(&refund.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::RefundChain { .. })));

        assert_eq!(stock_of(&db, &soda.id).await, 10);
    }

    #[tokio::test]
    async fn test_refund_lines_must_match_origin() {
        let db = test_db().await;
        let soda = stocked(&db, "SODA", 125, &[(10, None)]).await;
        let chips = stocked(&db, "CHIPS", 299, &[(10, None)]).await;
        let sale = db
            .ledger()
            .commit_sale(&cash_sale(vec![unit(&soda, 2)], 1000))
            .await
            .unwrap();

        let refund_of = |line: CommitLine| RefundRequest {
            lines: vec![line],
            tender_type: TenderType::Cash,
            original_transaction_id: sale.id.clone(),
            quoted: None,
        };

        let too_many = refund_of(CommitLine { quantity: -3, ..unit(&soda, 1) });
        let err = db.ledger().commit_refund(&too_many).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let never_sold = refund_of(CommitLine { quantity: -1, ..unit(&chips, 1) });
        let err = db.ledger().commit_refund(&never_sold).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let positive = refund_of(unit(&soda, 1));
        let err = db.ledger().commit_refund(&positive).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        // partial refund is fine
        let partial = refund_of(CommitLine { quantity: -1, ..unit(&soda, 1) });
        let refund = db.ledger().commit_refund(&partial).await.unwrap();
        assert_eq!(refund.total_cents, -125);
    }

    #[tokio::test]
    async fn test_refund_repays_snapshot_price() {
        let db = test_db().await;
        let soda = stocked(&db, "SODA", 125, &[(10, None)]).await;
        let sale = db
            .ledger()
            .commit_sale(&cash_sale(vec![unit(&soda, 1)], 1000))
            .await
            .unwrap();

        sqlx::query("UPDATE products SET price_cents = 999 WHERE id = ?1")
            .bind(&soda.id)
            .execute(db.pool())
            .await
            .unwrap();

        let items = db.ledger().lookup_for_return(&sale.id).await.unwrap();
        assert_eq!(items[0].unit_price_cents, 125);
    }

    #[tokio::test]
    async fn test_lookup_unknown_transaction() {
        let db = test_db().await;
        let err = db.ledger().lookup_for_return("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let (db, path) = file_db("oversell").await;
        let last = stocked(&db, "LAST", 500, &[(1, None)]).await;

        let request = cash_sale(vec![unit(&last, 1)], 1000);
        let ledger = db.ledger();
        let (a, b, c) = tokio::join!(
            ledger.commit_sale(&request),
            ledger.commit_sale(&request),
            ledger.commit_sale(&request),
        );

        let results = [a, b, c];
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.code(), ErrorCode::InsufficientStock);
        }
        assert_eq!(stock_of(&db, &last.id).await, 0);

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_concurrent_refunds_restore_stock_once() {
        let (db, path) = file_db("refund-race").await;
        let soda = stocked(&db, "SODA", 125, &[(10, None)]).await;
        let sale = db
            .ledger()
            .commit_sale(&cash_sale(vec![unit(&soda, 2)], 1000))
            .await
            .unwrap();

        let request = RefundRequest {
            lines: vec![CommitLine {
                quantity: -2,
                ..unit(&soda, 2)
            }],
            tender_type: TenderType::Cash,
            original_transaction_id: sale.id.clone(),
            quoted: None,
        };
        let ledger = db.ledger();
        let (a, b, c) = tokio::join!(
            ledger.commit_refund(&request),
            ledger.commit_refund(&request),
            ledger.commit_refund(&request),
        );

        let results = [a, b, c];
        let refunds: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(refunds.len(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.code(), ErrorCode::DuplicateRefund);
        }
        assert_eq!(stock_of(&db, &soda.id).await, 10);

        let origin = db.transactions().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(origin.refunded_by_id.as_deref(), Some(refunds[0].id.as_str()));

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_oversized_weight_never_commits_negative_sale() {
        let db = test_db().await;
        let brisket = db.products().insert(&weighed_product("BRISKET", 2000)).await.unwrap();

        let mut request = cash_sale(
            vec![CommitLine {
                product_id: brisket.id.clone(),
                quantity: 1,
                weight_milli: Some(i64::MAX),
                deli_order_id: None,
            }],
            0,
        );
        request.tender_type = TenderType::Card;
        request.amount_tendered_cents = None;

        let err = db.ledger().commit_sale(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(db.transactions().recent(10).await.unwrap().is_empty());

        request.lines[0].weight_milli = Some(MAX_WEIGHT_MILLI);
        let sale = db.ledger().commit_sale(&request).await.unwrap();
        assert_eq!(sale.subtotal_cents, 2_000_000);
        assert!(!sale.is_refund());
    }

    #[tokio::test]
    async fn test_configured_minimum_age_reaches_the_cart() {
        let config = LedgerConfig::from_toml("[pricing]\nminimum_age = 21\n").unwrap();
        let db = test_db().await.with_settings(config.settings());
        let beer = db
            .products()
            .insert(&Product {
                is_age_restricted: true,
                ..plain_product("BEER", 999, 6)
            })
            .await
            .unwrap();

        let cart = db
            .ledger()
            .start_cart(Utc::now())
            .await
            .unwrap()
            .add_item(CartLineSource::Catalog(beer))
            .unwrap();
        assert_eq!(cart.minimum_age(), 21);

        let err = cart.confirm_age(date(2005, 1, 1), date(2024, 6, 1)).unwrap_err();
        assert!(matches!(err, CoreError::AgeVerification { age: 19, minimum: 21 }));
        let cart = cart.confirm_age(date(2003, 1, 1), date(2024, 6, 1)).unwrap();
        assert_eq!(cart.quantity_of(&cart.items()[0].product_id), 1);
    }
}
