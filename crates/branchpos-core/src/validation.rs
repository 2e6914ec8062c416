//! # Validation Module
//!
//! Input validation utilities for BranchPOS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (axum)                                                  │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine services                                              │
//! │  └── THIS MODULE: request shape and business rules                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE / FOREIGN KEY constraints                                  │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  └── CHECK (total = subtotal + surcharge + tax - discount)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use branchpos_core::validation::{validate_quantity, validate_sku};
//!
//! validate_sku("TSHIRT-BLK").unwrap();
//! validate_quantity(3).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_INSTALLMENTS, MAX_LINE_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest size label accepted ("XXL", "42", "10.5").
pub const MAX_SIZE_LEN: usize = 20;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use branchpos_core::validation::validate_sku;
///
/// assert!(validate_sku("TSHIRT-BLK").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product or branch name: non-empty, at most 200 characters.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a branch code used in sale numbers.
///
/// Upper-case ASCII letters and digits, 1 to 12 characters.
pub fn validate_branch_code(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > 12 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 12,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only upper-case letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a required identifier-like field (user id, branch id).
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates the size of a line against the product's size rule.
///
/// A size must be present iff the product tracks sizes.
pub fn validate_size(
    product_id: &str,
    has_sizes: bool,
    size: Option<&str>,
) -> ValidationResult<()> {
    match (has_sizes, size) {
        (true, Some(size)) => {
            if size.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "size".to_string(),
                });
            }
            if size.len() > MAX_SIZE_LEN {
                return Err(ValidationError::TooLong {
                    field: "size".to_string(),
                    max: MAX_SIZE_LEN,
                });
            }
            Ok(())
        }
        (false, None) => Ok(()),
        _ => Err(ValidationError::SizeMismatch {
            product_id: product_id.to_string(),
            has_sizes,
        }),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
///
/// ## Example
/// ```rust
/// use branchpos_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(10_000).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-zero adjustment delta within the line quantity range.
pub fn validate_adjustment_delta(delta: i64) -> ValidationResult<()> {
    // unsigned_abs: i64::MIN has no positive counterpart
    if delta == 0 || delta.unsigned_abs() > MAX_LINE_QUANTITY.unsigned_abs() {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an amount in cents that may be zero but not negative
/// (price override, discount, explicit tax).
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates an installment count.
pub fn validate_installments(installments: u32) -> ValidationResult<()> {
    if installments == 0 || installments > MAX_INSTALLMENTS {
        return Err(ValidationError::OutOfRange {
            field: "installments".to_string(),
            min: 1,
            max: MAX_INSTALLMENTS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines of a sale request.
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("TSHIRT-BLK").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Camiseta negra").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_branch_code() {
        assert!(validate_branch_code("CENTRO").is_ok());
        assert!(validate_branch_code("B2").is_ok());
        assert!(validate_branch_code("centro").is_err());
        assert!(validate_branch_code("").is_err());
        assert!(validate_branch_code("ABCDEFGHIJKLM").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_adjustment_delta() {
        assert!(validate_adjustment_delta(5).is_ok());
        assert!(validate_adjustment_delta(-5).is_ok());
        assert!(validate_adjustment_delta(0).is_err());
        assert!(validate_adjustment_delta(MAX_LINE_QUANTITY + 1).is_err());
        assert!(validate_adjustment_delta(-MAX_LINE_QUANTITY).is_ok());
        assert!(validate_adjustment_delta(-MAX_LINE_QUANTITY - 1).is_err());
        assert!(validate_adjustment_delta(i64::MIN).is_err());
        assert!(validate_adjustment_delta(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_size_rule() {
        assert!(validate_size("p", true, Some("M")).is_ok());
        assert!(validate_size("p", false, None).is_ok());
        assert_eq!(
            validate_size("p", true, None),
            Err(ValidationError::SizeMismatch {
                product_id: "p".to_string(),
                has_sizes: true
            })
        );
        assert!(validate_size("p", false, Some("M")).is_err());
        assert!(validate_size("p", true, Some("  ")).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(MAX_SALE_LINES + 1).is_err());
    }

    #[test]
    fn test_validate_money_and_rates() {
        assert!(validate_non_negative_cents("discount", 0).is_ok());
        assert!(validate_non_negative_cents("discount", -1).is_err());
        assert!(validate_rate_bps("tax_rate", 10_000).is_ok());
        assert!(validate_rate_bps("tax_rate", 10_001).is_err());
        assert!(validate_installments(12).is_ok());
        assert!(validate_installments(0).is_err());
        assert!(validate_installments(MAX_INSTALLMENTS + 1).is_err());
    }
}
