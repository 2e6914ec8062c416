//! # Branch Repository
//!
//! Branches are managed elsewhere; the engine only needs to resolve them
//! (active check, code for sale numbers, tax override).

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use branchpos_core::validation::{validate_branch_code, validate_name, validate_rate_bps};
use branchpos_core::{Branch, CoreError};

const BRANCH_COLUMNS: &str =
    "id, code, name, tax_rate_bps, is_active, created_at, updated_at";

/// Repository for branch database operations.
#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    /// Creates an active branch.
    pub async fn create(
        &self,
        code: &str,
        name: &str,
        tax_rate_bps: Option<u32>,
    ) -> DbResult<Branch> {
        validate_branch_code(code).map_err(CoreError::from)?;
        validate_name("name", name).map_err(CoreError::from)?;
        if let Some(bps) = tax_rate_bps {
            validate_rate_bps("tax_rate_bps", bps).map_err(CoreError::from)?;
        }

        let now = Utc::now();
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.trim().to_string(),
            tax_rate_bps: tax_rate_bps.map(i64::from),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert(&branch).await?;
        Ok(branch)
    }

    /// Inserts a fully-formed branch row.
    pub async fn insert(&self, branch: &Branch) -> DbResult<()> {
        debug!(id = %branch.id, code = %branch.code, "Inserting branch");

        sqlx::query(
            r#"
            INSERT INTO branches (id, code, name, tax_rate_bps, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(branch.tax_rate_bps)
        .bind(branch.is_active)
        .bind(branch.created_at)
        .bind(branch.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a branch by ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        Self::get_by_id_in(&self.pool, id).await
    }

    pub async fn get_by_id_in<'e, E>(executor: E, id: &str) -> DbResult<Option<Branch>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {} FROM branches WHERE id = ?1", BRANCH_COLUMNS);
        let branch = sqlx::query_as::<_, Branch>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(branch)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Branch>> {
        let sql = format!("SELECT {} FROM branches WHERE code = ?1", BRANCH_COLUMNS);
        let branch = sqlx::query_as::<_, Branch>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(branch)
    }

    /// Lists active branches ordered by code.
    pub async fn list_active(&self) -> DbResult<Vec<Branch>> {
        let sql = format!(
            "SELECT {} FROM branches WHERE is_active = 1 ORDER BY code",
            BRANCH_COLUMNS
        );
        let branches = sqlx::query_as::<_, Branch>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(branches)
    }

    /// Marks a branch inactive. Sales and transfers against it are refused.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE branches SET is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
