//! # Ledger Configuration
//!
//! Configuration for the register's ledger database, pricing and retry policy.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults          tax 8%, minimum age 18, 5 attempts              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  2. basket.toml       <config dir>/basket.toml (ProjectDirs)           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  3. Environment       BASKET_DB_PATH, BASKET_TAX_RATE,                 │
//! │                       BASKET_MIN_AGE, BASKET_RETRY_ATTEMPTS            │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use basket_core::{
    TaxRate, DEFAULT_MINIMUM_AGE, DEFAULT_TAX_RATE_BPS, EXPIRATION_WINDOW_DAYS,
    LOW_STOCK_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;
use crate::retry::RetryPolicy;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to `basket.db` in the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSection {
    #[serde(default = "default_tax_rate")]
    pub tax_rate_bps: u32,

    #[serde(default = "default_minimum_age")]
    pub minimum_age: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySection {
    #[serde(default = "default_low_stock")]
    pub low_stock_threshold: i64,

    #[serde(default = "default_expiration_window")]
    pub expiration_window_days: i64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "basket", "pos")
        .map(|dirs| dirs.data_dir().join("basket.db"))
        .unwrap_or_else(|| PathBuf::from("basket.db"))
}
fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout() -> u64 {
    250
}
fn default_tax_rate() -> u32 {
    DEFAULT_TAX_RATE_BPS
}
fn default_minimum_age() -> i64 {
    DEFAULT_MINIMUM_AGE
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    25
}
fn default_max_backoff() -> u64 {
    500
}
fn default_low_stock() -> i64 {
    LOW_STOCK_THRESHOLD
}
fn default_expiration_window() -> i64 {
    EXPIRATION_WINDOW_DAYS
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl Default for PricingSection {
    fn default() -> Self {
        PricingSection {
            tax_rate_bps: default_tax_rate(),
            minimum_age: default_minimum_age(),
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        RetrySection {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl Default for InventorySection {
    fn default() -> Self {
        InventorySection {
            low_stock_threshold: default_low_stock(),
            expiration_window_days: default_expiration_window(),
        }
    }
}

// =============================================================================
// Runtime Settings
// =============================================================================

/// The pricing and inventory knobs the ledger services read at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub tax_rate: TaxRate,
    pub minimum_age: i64,
    pub low_stock_threshold: i64,
    pub expiration_window_days: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            tax_rate: TaxRate::from_bps(DEFAULT_TAX_RATE_BPS),
            minimum_age: DEFAULT_MINIMUM_AGE,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            expiration_window_days: EXPIRATION_WINDOW_DAYS,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete ledger configuration.
///
/// ## Example Config File
/// ```toml
/// [database]
/// path = "/var/lib/basket/basket.db"
/// max_connections = 5
/// busy_timeout_ms = 250
///
/// [pricing]
/// tax_rate_bps = 825
/// minimum_age = 21
///
/// [retry]
/// max_attempts = 5
/// initial_backoff_ms = 25
/// max_backoff_ms = 500
///
/// [inventory]
/// low_stock_threshold = 10
/// expiration_window_days = 30
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub pricing: PricingSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub inventory: InventorySection,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections and keys take defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Rejects settings the ledger cannot run with.
    pub fn validate(&self) -> DbResult<()> {
        if self.pricing.tax_rate_bps > 10_000 {
            return Err(DbError::Config(format!(
                "tax_rate_bps must be at most 10000, got {}",
                self.pricing.tax_rate_bps
            )));
        }

        if self.pricing.minimum_age < 0 {
            return Err(DbError::Config("minimum_age must not be negative".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(DbError::Config(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(DbError::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BASKET_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        // Percent, e.g. "8.25"
        if let Ok(rate) = std::env::var("BASKET_TAX_RATE") {
            match rate.parse::<f64>() {
                Ok(pct) if pct >= 0.0 => {
                    self.pricing.tax_rate_bps = TaxRate::from_percentage(pct).bps();
                }
                _ => warn!(rate = %rate, "Ignoring invalid BASKET_TAX_RATE"),
            }
        }

        if let Ok(age) = std::env::var("BASKET_MIN_AGE") {
            match age.parse::<i64>() {
                Ok(a) => self.pricing.minimum_age = a,
                Err(_) => warn!(age = %age, "Ignoring invalid BASKET_MIN_AGE"),
            }
        }

        if let Ok(attempts) = std::env::var("BASKET_RETRY_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(attempts = %attempts, "Ignoring invalid BASKET_RETRY_ATTEMPTS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "basket", "pos")
            .map(|dirs| dirs.config_dir().join("basket.toml"))
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    pub fn settings(&self) -> LedgerSettings {
        LedgerSettings {
            tax_rate: TaxRate::from_bps(self.pricing.tax_rate_bps),
            minimum_age: self.pricing.minimum_age,
            low_stock_threshold: self.inventory.low_stock_threshold,
            expiration_window_days: self.inventory.expiration_window_days,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
