//! # Seed Data Generator
//!
//! Populates a database with demo branches, products and opening stock.
//!
//! ## Usage
//! ```bash
//! # Seed ./branchpos_dev.db with the default 3 units per counter
//! cargo run -p branchpos-db --bin seed
//!
//! # Custom opening stock and database path
//! cargo run -p branchpos-db --bin seed -- --stock 25 --db ./data/branchpos.db
//! ```
//!
//! Re-running is safe: branches are matched by code and products by SKU,
//! and only missing ones are created and stocked.
//!
//! Opening stock is written through the stock ledger as ADJUSTMENT
//! movements (`reference_type = "SEED"`), so the movement log replays to
//! the seeded counters like any other history.

use branchpos_core::{MovementType, StockKey};
use branchpos_db::{Database, DbConfig, MovementRequest, NewProduct};
use std::env;

/// Demo branches: (code, name, tax override in bps)
const BRANCHES: &[(&str, &str, Option<u32>)] = &[
    ("CENTRO", "Sucursal Centro", None),
    ("NORTE", "Sucursal Norte", None),
    ("SUR", "Sucursal Sur", Some(1050)),
    ("WEB", "Tienda Online", None),
];

/// Demo catalog: (sku, name, price in cents, min_stock, has_sizes)
const PRODUCTS: &[(&str, &str, i64, i64, bool)] = &[
    ("TSHIRT-BLK", "Camiseta Negra", 10_000, 3, true),
    ("TSHIRT-WHT", "Camiseta Blanca", 10_000, 3, true),
    ("JEANS-SLIM", "Jean Slim", 35_000, 2, true),
    ("HOODIE-GRY", "Buzo Gris", 28_000, 2, true),
    ("SNEAKER-RUN", "Zapatilla Running", 55_000, 2, true),
    ("CAP-LOGO", "Gorra Logo", 6_500, 5, false),
    ("SOCKS-3P", "Medias Pack x3", 3_900, 10, false),
    ("BELT-LEA", "Cinturon Cuero", 12_000, 2, false),
    ("BAG-TOTE", "Bolso Tote", 9_500, 2, false),
    ("GIFT-CARD", "Tarjeta Regalo", 20_000, 0, false),
];

const APPAREL_SIZES: &[&str] = &["S", "M", "L", "XL"];
const SHOE_SIZES: &[&str] = &["38", "40", "42", "44"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut opening_stock: i64 = 3;
    let mut db_path = String::from("./branchpos_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    opening_stock = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("BranchPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stock <N>    Opening stock per counter (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./branchpos_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 BranchPOS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Opening stock: {}", opening_stock);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let start = std::time::Instant::now();

    let mut branches = Vec::with_capacity(BRANCHES.len());
    let mut created_branches = 0usize;
    for (code, name, tax) in BRANCHES {
        let branch = match db.branches().get_by_code(code).await? {
            Some(existing) => existing,
            None => {
                created_branches += 1;
                db.branches().create(code, name, *tax).await?
            }
        };
        branches.push(branch);
    }
    println!(
        "✓ Created {} branches ({} already present)",
        created_branches,
        branches.len() - created_branches
    );

    let mut movements = 0usize;
    let mut created_products = 0usize;
    for (sku, name, price_cents, min_stock, has_sizes) in PRODUCTS {
        // Existing products keep their stock; re-running only fills gaps.
        if db.products().get_by_sku(sku).await?.is_some() {
            continue;
        }
        created_products += 1;
        let product = db
            .products()
            .create(NewProduct {
                sku: sku.to_string(),
                barcode: None,
                name: name.to_string(),
                price_cents: *price_cents,
                cost_cents: Some(price_cents * 55 / 100),
                min_stock: *min_stock,
                has_sizes: *has_sizes,
            })
            .await?;

        let sizes: &[&str] = match (*has_sizes, sku.starts_with("SNEAKER")) {
            (false, _) => &[],
            (true, true) => SHOE_SIZES,
            (true, false) => APPAREL_SIZES,
        };

        for branch in &branches {
            let keys: Vec<StockKey> = if sizes.is_empty() {
                vec![StockKey::new(&product.id, &branch.id)]
            } else {
                sizes
                    .iter()
                    .map(|size| StockKey::sized(&product.id, &branch.id, *size))
                    .collect()
            };

            for key in keys {
                if opening_stock <= 0 {
                    continue;
                }
                let request = MovementRequest::new(key, opening_stock, MovementType::Adjustment)
                    .with_reference("SEED", "opening-stock")
                    .with_notes(Some("Opening stock".to_string()));
                if let Err(e) = db.stock().apply_movement(request).await {
                    eprintln!("Failed to stock {} at {}: {}", product.sku, branch.code, e);
                    continue;
                }
                movements += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!(
        "✓ Created {} products ({} in catalog)",
        created_products,
        db.products().count().await?
    );
    println!("✓ Wrote {} opening-stock movements in {:?}", movements, elapsed);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
