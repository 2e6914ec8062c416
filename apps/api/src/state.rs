//! Shared application state handed to every handler.

use std::sync::Arc;

use branchpos_core::CurrencyFormat;
use branchpos_db::Database;
use branchpos_engine::{
    EngineResult, InventoryService, PricingPolicy, SaleTransactionService, StaticPricingPolicy,
    StockTransferService,
};

use crate::config::AppConfig;

/// Services wired once at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sales: SaleTransactionService,
    pub transfers: StockTransferService,
    pub inventory: InventoryService,
    pub currency: CurrencyFormat,
}

impl AppState {
    /// Builds the services from the loaded configuration.
    pub fn new(db: Database, config: &AppConfig) -> EngineResult<Self> {
        let policy: Arc<dyn PricingPolicy> = Arc::new(
            StaticPricingPolicy::new(config.pricing.tax_rate())
                .with_plans(config.pricing.payment_plans.clone())?,
        );
        let retry = config.engine.retry_policy();

        Ok(AppState {
            sales: SaleTransactionService::with_options(
                db.clone(),
                policy,
                config.engine.sale_options(),
            ),
            transfers: StockTransferService::with_retry(db.clone(), retry),
            inventory: InventoryService::with_retry(db.clone(), retry),
            currency: config.pricing.currency.clone(),
            db,
        })
    }
}
