//! # Repository Module
//!
//! Database repository implementations for BranchPOS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two ways into every repository                       │
//! │                                                                         │
//! │  Standalone (own connection from the pool)                              │
//! │       db.sales().get_by_id("...")                                       │
//! │                                                                         │
//! │  Inside a unit of work (caller's transaction)                           │
//! │       let mut tx = db.begin().await?;                                   │
//! │       SaleRepository::insert_sale_in(&mut *tx, &sale).await?;           │
//! │       StockLedger::apply_movement_in(&mut tx, request).await?;          │
//! │       tx.commit().await?;                                               │
//! │                                                                         │
//! │  `_in` functions never open or commit transactions themselves.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BranchRepository`](branch::BranchRepository) - Branch lookups
//! - [`ProductRepository`](product::ProductRepository) - Catalog lookups
//! - [`SaleRepository`](sale::SaleRepository) - Sales, items, sale numbers
//! - [`StockLedger`](stock::StockLedger) - Stock counters + movement log
//! - [`TransferRepository`](transfer::TransferRepository) - Transfer headers

pub mod branch;
pub mod product;
pub mod sale;
pub mod stock;
pub mod transfer;

#[cfg(test)]
pub(crate) mod fixtures {
    use branchpos_core::{Branch, Product};

    use super::branch::BranchRepository;
    use super::product::{NewProduct, ProductRepository};
    use crate::{Database, DbConfig};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn branch(db: &Database, code: &str) -> Branch {
        BranchRepository::new(db.pool().clone())
            .create(code, &format!("Branch {}", code), None)
            .await
            .unwrap()
    }

    pub async fn product(db: &Database, sku: &str, price_cents: i64, has_sizes: bool) -> Product {
        ProductRepository::new(db.pool().clone())
            .create(NewProduct {
                sku: sku.to_string(),
                barcode: None,
                name: format!("Product {}", sku),
                price_cents,
                cost_cents: None,
                min_stock: 2,
                has_sizes,
            })
            .await
            .unwrap()
    }
}
