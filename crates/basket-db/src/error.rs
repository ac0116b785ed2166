//! # Database Error Types
//!
//! Error types for ledger and storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Business rule (CoreError)         │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  DbError (this module) ◄──── Domain(CoreError) ───┘                    │
//! │       │                                                                 │
//! │       ├── is_transient()? ──► retry loop (retry.rs)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  code() ──► ErrorCode  ("STOCK_CEILING", "TOKEN_REPLAY", ...)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Register displays a message, or retries / asks for a correction       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every commit-time error is raised before the database transaction commits,
//! so an error always means zero persisted side effects.

use basket_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - Unknown product, transaction, customer or deli token id
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU or barcode
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - A line references a product that does not exist
    /// - A lot references a deleted product
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A concurrent writer got there first.
    ///
    /// ## When This Occurs
    /// - SQLite reports the database busy or locked past `busy_timeout`
    /// - A guarded update (`WHERE stock_quantity >= ?`, `WHERE is_fulfilled = 0`,
    ///   `WHERE refunded_by_id IS NULL`) matched no row after a read in the
    ///   same transaction said it would
    ///
    /// Safe to retry the whole operation.
    #[error("Concurrency conflict: {0}")]
    Conflict(String),

    /// The retry budget ran out while conflicts kept occurring.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict(message.into())
    }

    /// Whether repeating the whole operation may succeed.
    ///
    /// Only lock contention qualifies. Business-rule failures (stock,
    /// refunds, tokens) and validation errors are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Conflict(_) | DbError::PoolExhausted)
    }

    /// Stable machine-readable code for callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            DbError::NotFound { .. } => ErrorCode::NotFound,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ErrorCode::ValidationError
            }
            DbError::Conflict(_) | DbError::RetryExhausted { .. } => {
                ErrorCode::ConcurrencyConflict
            }
            DbError::Config(_) => ErrorCode::ConfigError,
            DbError::Domain(err) => ErrorCode::from(err),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorCode::DatabaseError,
        }
    }

    /// Serializable `{ code, message }` pair for a front end.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

// =============================================================================
// Error Codes
// =============================================================================

/// Error codes handed to UI / CLI callers.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.code) {
///   case 'STOCK_CEILING':       showToast(e.message); break;
///   case 'CONCURRENCY_CONFLICT': retryCheckout(); break;
///   case 'TOKEN_REPLAY':        showToast('Sticker already used'); break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    StockCeiling,
    InsufficientStock,
    AgeVerification,
    DuplicateRefund,
    RefundChain,
    TokenReplay,
    CartError,
    PaymentError,
    ConcurrencyConflict,
    PricingMismatch,
    ConfigError,
    DatabaseError,
}

impl From<&CoreError> for ErrorCode {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::Validation(_) | CoreError::NotACase(_) => ErrorCode::ValidationError,
            CoreError::StockCeiling { .. } => ErrorCode::StockCeiling,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::AgeVerification { .. } => ErrorCode::AgeVerification,
            CoreError::DuplicateRefund { .. } => ErrorCode::DuplicateRefund,
            CoreError::RefundChain { .. } => ErrorCode::RefundChain,
            CoreError::TokenReplay { .. } => ErrorCode::TokenReplay,
            CoreError::InvalidCartOperation { .. } => ErrorCode::CartError,
            CoreError::InvalidPayment { .. } => ErrorCode::PaymentError,
            CoreError::PricingMismatch { .. } => ErrorCode::PricingMismatch,
        }
    }
}

/// What a front end receives when an operation fails.
///
/// ```json
/// { "code": "DUPLICATE_REFUND", "message": "Transaction ... was already refunded by ..." }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

// =============================================================================
// sqlx Conversions
// =============================================================================

/// SQLite primary result codes for lock contention (SQLITE_BUSY, SQLITE_LOCKED)
/// and their extended forms.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy/locked → Conflict, else constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let busy = db_err
                    .code()
                    .map_or(false, |code| BUSY_CODES.contains(&code.as_ref()))
                    || msg.contains("database is locked")
                    || msg.contains("database table is locked");

                if busy {
                    DbError::Conflict(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<basket_core::ValidationError> for DbError {
    fn from(err: basket_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
