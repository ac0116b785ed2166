//! # Error Types
//!
//! Domain-specific error types for basket-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  basket-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  basket-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, conflicts, Domain(CoreError) │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller (ErrorCode)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recoverability
//! - `StockCeiling`: the cashier may retry with a smaller quantity
//! - `InsufficientStock`: aborts the whole commit (full rollback)
//! - `PricingMismatch`: client and server disagree, never trust the client

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Unknown product, transaction, customer, lot or deli token.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Cart quantity would exceed the on-hand counter.
    ///
    /// ## User Workflow
    /// ```text
    /// Scan SODA (stock: 1, in cart: 1)
    ///      │
    ///      ▼
    /// StockCeiling { sku: "SODA", available: 1, requested: 2 }
    ///      │
    ///      ▼
    /// UI shows: "Only 1 SODA available"  (cart unchanged)
    /// ```
    #[error("Stock ceiling reached for {sku}: available {available}, requested {requested}")]
    StockCeiling {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Commit-time shortage in the aggregate counter or the lot ledger.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error("Customer is {age}, must be at least {minimum}")]
    AgeVerification { age: i64, minimum: i64 },

    #[error("Transaction {transaction_id} was already refunded by {refunded_by}")]
    DuplicateRefund {
        transaction_id: String,
        refunded_by: String,
    },

    #[error("Transaction {transaction_id} is itself a refund and cannot be refunded")]
    RefundChain { transaction_id: String },

    #[error("Deli token {token} has already been used")]
    TokenReplay { token: String },

    /// The cart refused a transition (return mode, weighed line, pending input).
    #[error("Cart operation rejected: {reason}")]
    InvalidCartOperation { reason: String },

    #[error("Product {0} is not a configured case")]
    NotACase(String),

    #[error("Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// Client-submitted totals disagree with the server's re-pricing.
    #[error("Pricing mismatch on {field}: quoted {quoted}, computed {computed}")]
    PricingMismatch {
        field: String,
        quoted: i64,
        computed: i64,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn cart(reason: impl Into<String>) -> Self {
        CoreError::InvalidCartOperation {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any business logic runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
