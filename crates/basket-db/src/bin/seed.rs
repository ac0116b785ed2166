//! # Seed Data Generator
//!
//! Populates a development database with a small grocery catalog.
//!
//! ## Usage
//! ```bash
//! # Use basket.toml / BASKET_DB_PATH, or ./basket_dev.db
//! cargo run -p basket-db --bin seed
//!
//! # Specify database path
//! cargo run -p basket-db --bin seed -- --db ./data/basket.db
//! ```
//!
//! ## Generated Data
//! - Unit products with dated lots (received through the inventory manager,
//!   so lots and on-hand counters agree)
//! - A 24-pack case linked to its single cans
//! - Weighed products for the deli counter and produce scale
//! - An age-restricted product
//! - A 10% promotion on milk
//! - A loyalty customer and one deli token ready to scan

use basket_core::{Product, Promotion, Weight};
use basket_db::{Database, LedgerConfig};
use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// (sku, barcode, name, price, cost, weighed, unit, age restricted)
type Row = (&'static str, &'static str, &'static str, i64, i64, bool, &'static str, bool);

const CATALOG: &[Row] = &[
    ("MILK-1GAL", "0711000001", "Whole Milk 1 gal", 349, 210, false, "each", false),
    ("BREAD-WHT", "0711000002", "White Bread", 279, 120, false, "each", false),
    ("EGGS-12", "0711000003", "Large Eggs 12ct", 399, 250, false, "each", false),
    ("SODA-12OZ", "0711000004", "Cola 12oz Can", 125, 40, false, "each", false),
    ("BEER-6PK", "0711000005", "Lager 6-Pack", 999, 600, false, "each", true),
    ("HAM-DELI", "0711000006", "Deli Ham", 899, 450, true, "lb", false),
    ("APPLE-GALA", "0711000007", "Gala Apples", 199, 90, true, "lb", false),
];

/// (sku, quantity, days until expiration)
const LOTS: &[(&str, i64, Option<i64>)] = &[
    ("MILK-1GAL", 12, Some(5)),
    ("MILK-1GAL", 24, Some(12)),
    ("BREAD-WHT", 20, Some(4)),
    ("EGGS-12", 30, Some(21)),
    ("SODA-12OZ", 48, None),
    ("BEER-6PK", 18, Some(120)),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Basket POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: ./basket_dev.db)");
                println!("  -c, --config <PATH>   basket.toml to load");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = PathBuf::from(path);
    } else if env::var("BASKET_DB_PATH").is_err() {
        config.database.path = PathBuf::from("./basket_dev.db");
    }

    println!("🌱 Basket POS Seed Data Generator");
    println!("=================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::open(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let today = now.date_naive();

    // Catalog
    let mut inserted = Vec::with_capacity(CATALOG.len());
    for &(sku, barcode, name, price_cents, cost_cents, is_weighed, unit, is_age_restricted) in CATALOG {
        let product = Product {
            id: String::new(),
            sku: sku.to_string(),
            barcode: Some(barcode.to_string()),
            name: name.to_string(),
            price_cents,
            cost_cents: Some(cost_cents),
            stock_quantity: 0,
            is_weighed,
            unit: unit.to_string(),
            is_age_restricted,
            contains_product_id: None,
            case_unit_count: None,
            created_at: now,
            updated_at: now,
        };
        inserted.push(db.products().insert(&product).await?);
    }
    println!("✓ Inserted {} products", inserted.len());

    let id_of = |sku: &str| -> Result<String, Box<dyn std::error::Error>> {
        inserted
            .iter()
            .find(|p| p.sku == sku)
            .map(|p| p.id.clone())
            .ok_or_else(|| format!("seed catalog is missing {sku}").into())
    };

    // Case of 24 cans
    let soda_id = id_of("SODA-12OZ")?;
    let case = db
        .products()
        .insert(&Product {
            id: String::new(),
            sku: "SODA-12OZ-24".to_string(),
            barcode: Some("0711000024".to_string()),
            name: "Cola 12oz 24-Pack".to_string(),
            price_cents: 1899,
            cost_cents: Some(960),
            stock_quantity: 0,
            is_weighed: false,
            unit: "case".to_string(),
            is_age_restricted: false,
            contains_product_id: Some(soda_id),
            case_unit_count: Some(24),
            created_at: now,
            updated_at: now,
        })
        .await?;
    println!("✓ Inserted case {} (24 × SODA-12OZ)", case.sku);

    // Lots
    let inventory = db.inventory();
    let mut received = 0;
    for &(sku, quantity, expires_in) in LOTS {
        let expiration = expires_in.and_then(|days| today.checked_add_signed(Duration::days(days)));
        inventory.receive_stock(&id_of(sku)?, quantity, expiration).await?;
        received += 1;
    }
    inventory.receive_stock(&case.id, 6, None).await?;
    println!("✓ Received {} lots", received + 1);

    // Promotion
    let promotion = db
        .promotions()
        .insert(&Promotion {
            id: String::new(),
            description: "10% off milk".to_string(),
            discount_bps: 1000,
            start_date: now - Duration::days(1),
            end_date: Some(now + Duration::days(30)),
            is_active: true,
            product_ids: vec![id_of("MILK-1GAL")?],
            created_at: now,
        })
        .await?;
    println!("✓ Promotion: {}", promotion.description);

    // Customer
    let customer = db.customers().create("Demo Customer").await?;
    println!("✓ Customer: {} ({})", customer.name, customer.id);

    // Deli token
    let token = db
        .deli()
        .issue(&id_of("HAM-DELI")?, Weight::from_milli(1250))
        .await?;
    println!(
        "✓ Deli token {} for 1.250 lb ham ({} cents)",
        token.id, token.total_price_cents
    );

    println!();
    let expiring = inventory.expiring_lots(today).await?;
    println!("Lots expiring within {} days: {}", db.settings().expiration_window_days, expiring.len());
    for lot in &expiring {
        println!("  {} {:>4} × {}", lot.expiration_date, lot.quantity_remaining, lot.name);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
