//! # Validation Module
//!
//! Input validation for the ledger's entry points.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Cart transitions (basket-core)                               │
//! │  └── THIS MODULE: quantities, weights, ages, payment amounts           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Commit protocol (basket-db)                                  │
//! │  └── Re-pricing, stock guards, refund linkage                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity_remaining BETWEEN 0 AND quantity_received)        │
//! │  └── CHECK (stock_quantity >= 0), foreign keys                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Datelike, NaiveDate};

use crate::error::ValidationError;
use crate::money::Weight;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MAX_WEIGHT_MILLI};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU: non-empty, at most 50 characters, `[A-Za-z0-9_-]`.
///
/// ## Example
/// ```rust
/// use basket_core::validation::validate_sku;
///
/// assert!(validate_sku("MILK-1GAL").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an identifier field (product id, transaction id, token).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a unit quantity: `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock movement (received units, cases broken). No upper cap.
pub fn validate_stock_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a scale reading: `1..=MAX_WEIGHT_MILLI`.
///
/// ## Example
/// ```rust
/// use basket_core::money::Weight;
/// use basket_core::validation::validate_weight;
///
/// assert!(validate_weight(Weight::from_milli(1250)).is_ok());
/// assert!(validate_weight(Weight::from_milli(0)).is_err());
/// assert!(validate_weight(Weight::from_milli(i64::MAX)).is_err());
/// ```
pub fn validate_weight(weight: Weight) -> ValidationResult<()> {
    if !weight.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "weight".to_string(),
        });
    }
    if weight.milli() > MAX_WEIGHT_MILLI {
        return Err(ValidationError::OutOfRange {
            field: "weight".to_string(),
            min: 1,
            max: MAX_WEIGHT_MILLI,
        });
    }
    Ok(())
}

/// Validates a price in cents: `0..=MAX_PRICE_CENTS`.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates a promotion discount in basis points (0% exclusive to 100%).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps == 0 || bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 1,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates the number of distinct lines before inserting a new one.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Age
// =============================================================================

/// Whole years between `birth_date` and `as_of`.
///
/// A birthday that has not yet come around this year does not count.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use basket_core::validation::age_on;
///
/// let birth = NaiveDate::from_ymd_opt(2006, 6, 15).unwrap();
/// assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()).unwrap(), 17);
/// assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()).unwrap(), 18);
/// ```
pub fn age_on(birth_date: NaiveDate, as_of: NaiveDate) -> ValidationResult<i64> {
    if birth_date > as_of {
        return Err(ValidationError::InvalidFormat {
            field: "birth_date".to_string(),
            reason: "must not be in the future".to_string(),
        });
    }

    let mut years = (as_of.year() - birth_date.year()) as i64;
    if (as_of.month(), as_of.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    Ok(years)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("MILK-1GAL").is_ok());
        assert!(validate_sku("egg_dozen").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(Weight::from_milli(1)).is_ok());
        assert!(validate_weight(Weight::from_milli(0)).is_err());
        assert!(validate_weight(Weight::from_milli(-250)).is_err());
        assert!(validate_weight(Weight::from_milli(MAX_WEIGHT_MILLI)).is_ok());
        assert!(matches!(
            validate_weight(Weight::from_milli(MAX_WEIGHT_MILLI + 1)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
    }

    #[test]
    fn test_validate_rates() {
        assert!(validate_tax_rate_bps(800).is_ok());
        assert!(validate_tax_rate_bps(10_001).is_err());

        assert!(validate_discount_bps(1000).is_ok());
        assert!(validate_discount_bps(0).is_err());
        assert!(validate_discount_bps(10_001).is_err());
    }

    #[test]
    fn test_age_on_handles_leap_day_birthdays() {
        let birth = NaiveDate::from_ymd_opt(2004, 2, 29).unwrap();
        let before = NaiveDate::from_ymd_opt(2022, 2, 28).unwrap();
        let after = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();

        assert_eq!(age_on(birth, before).unwrap(), 17);
        assert_eq!(age_on(birth, after).unwrap(), 18);
    }

    #[test]
    fn test_age_on_rejects_future_birth_date() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(age_on(tomorrow, today).is_err());
    }
}
