//! # Stock Transfer Service
//!
//! Moves units of one product (and size) between two branches.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    TRANSFER_OUT  source       qty − n   (fails → nothing credited)      │
//! │    TRANSFER_IN   destination  qty + n                                   │
//! │    INSERT stock_transfers header                                        │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The product's total across branches is unchanged by a transfer.

use branchpos_core::validation::{validate_quantity, validate_size};
use branchpos_core::{InventoryMovement, StockTransfer, ValidationError};
use branchpos_db::{Database, TransferRepository};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::{require_branch, require_product};
use crate::error::EngineResult;
use crate::inventory::{stock_key, InventoryService, StockReference};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferRequest {
    pub product_id: String,
    pub from_branch_id: String,
    pub to_branch_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Counter value before and after the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockChange {
    pub before: i64,
    pub after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferResult {
    pub transfer: StockTransfer,
    pub source: StockChange,
    pub destination: StockChange,
    /// (TRANSFER_OUT, TRANSFER_IN)
    pub movements: (InventoryMovement, InventoryMovement),
}

#[derive(Debug, Clone)]
pub struct StockTransferService {
    db: Database,
    retry: RetryPolicy,
}

impl StockTransferService {
    pub fn new(db: Database) -> Self {
        StockTransferService::with_retry(db, RetryPolicy::default())
    }

    pub fn with_retry(db: Database, retry: RetryPolicy) -> Self {
        StockTransferService { db, retry }
    }

    /// Debits the source and credits the destination in one transaction.
    pub async fn transfer(&self, request: TransferRequest) -> EngineResult<TransferResult> {
        if request.from_branch_id == request.to_branch_id {
            return Err(ValidationError::MustDiffer {
                field: "to_branch_id".to_string(),
                other: "from_branch_id".to_string(),
            }
            .into());
        }
        validate_quantity(request.quantity)?;

        let product = require_product(&self.db, &request.product_id).await?;
        let from = require_branch(&self.db, &request.from_branch_id).await?;
        let to = require_branch(&self.db, &request.to_branch_id).await?;
        validate_size(&product.id, product.has_sizes, request.size.as_deref())?;

        let result = self
            .retry
            .run("transfer", || self.transfer_once(&request))
            .await?;

        info!(
            transfer_id = %result.transfer.id,
            product = %product.sku,
            from = %from.code,
            to = %to.code,
            quantity = request.quantity,
            "Stock transferred"
        );

        Ok(result)
    }

    async fn transfer_once(&self, request: &TransferRequest) -> EngineResult<TransferResult> {
        let transfer = StockTransfer {
            id: Uuid::new_v4().to_string(),
            product_id: request.product_id.clone(),
            from_branch_id: request.from_branch_id.clone(),
            to_branch_id: request.to_branch_id.clone(),
            size: request.size.clone(),
            quantity: request.quantity,
            reason: request.reason.clone(),
            user_id: request.user_id.clone(),
            created_at: Utc::now(),
        };

        let source_key = stock_key(
            &request.product_id,
            &request.from_branch_id,
            request.size.as_deref(),
        );
        let destination_key = source_key.at_branch(&request.to_branch_id);

        let mut tx = self.db.begin().await?;

        let out = InventoryService::decrease_stock_in(
            &mut tx,
            &source_key,
            request.quantity,
            StockReference::transfer_out(&transfer.id)
                .with_notes(request.reason.clone())
                .with_user(request.user_id.clone()),
        )
        .await?;

        let inbound = InventoryService::increase_stock_in(
            &mut tx,
            &destination_key,
            request.quantity,
            StockReference::transfer_in(&transfer.id)
                .with_notes(request.reason.clone())
                .with_user(request.user_id.clone()),
        )
        .await?;

        TransferRepository::insert_in(&mut *tx, &transfer).await?;

        tx.commit().await?;

        Ok(TransferResult {
            transfer,
            source: StockChange {
                before: out.previous_stock,
                after: out.new_stock,
            },
            destination: StockChange {
                before: inbound.previous_stock,
                after: inbound.new_stock,
            },
            movements: (out.movement, inbound.movement),
        })
    }
}
