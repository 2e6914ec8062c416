//! # Transfer Repository
//!
//! Stock transfer headers. The header id is the `reference_id` of the
//! TRANSFER_OUT / TRANSFER_IN movement pair.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use branchpos_core::StockTransfer;

const TRANSFER_COLUMNS: &str =
    "id, product_id, from_branch_id, to_branch_id, size, quantity, reason, user_id, created_at";

#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    pub async fn insert_in<'e, E>(executor: E, transfer: &StockTransfer) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            id = %transfer.id,
            from = %transfer.from_branch_id,
            to = %transfer.to_branch_id,
            quantity = transfer.quantity,
            "Inserting stock transfer"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_transfers (
                id, product_id, from_branch_id, to_branch_id, size,
                quantity, reason, user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.product_id)
        .bind(&transfer.from_branch_id)
        .bind(&transfer.to_branch_id)
        .bind(&transfer.size)
        .bind(transfer.quantity)
        .bind(&transfer.reason)
        .bind(&transfer.user_id)
        .bind(transfer.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockTransfer>> {
        let sql = format!("SELECT {} FROM stock_transfers WHERE id = ?1", TRANSFER_COLUMNS);
        let transfer = sqlx::query_as::<_, StockTransfer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transfer)
    }
}
