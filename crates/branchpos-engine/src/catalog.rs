//! Lookups of the reference data every service resolves first.

use branchpos_core::validation::validate_required;
use branchpos_core::{Branch, Product};
use branchpos_db::Database;

use crate::error::{EngineError, EngineResult};

/// Active product by id, or `ProductNotFound`.
pub(crate) async fn require_product(db: &Database, product_id: &str) -> EngineResult<Product> {
    validate_required("product_id", product_id)?;
    match db.products().get_by_id(product_id).await? {
        Some(product) if product.is_active => Ok(product),
        _ => Err(EngineError::ProductNotFound(product_id.to_string())),
    }
}

/// Active branch by id, or `BranchNotFound`.
pub(crate) async fn require_branch(db: &Database, branch_id: &str) -> EngineResult<Branch> {
    validate_required("branch_id", branch_id)?;
    match db.branches().get_by_id(branch_id).await? {
        Some(branch) if branch.is_active => Ok(branch),
        _ => Err(EngineError::BranchNotFound(branch_id.to_string())),
    }
}
