//! # Pricing Calculator
//!
//! Computes the financial breakdown of an order.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal  = Σ unit_price × quantity           (exact, no rounding)     │
//! │  surcharge = round(subtotal × surcharge_bps / 10000)                    │
//! │  tax       = round(subtotal × tax_bps / 10000)  or an explicit amount   │
//! │  total     = subtotal + surcharge + tax − discount                      │
//! │                                                                         │
//! │  round() = half-up, away from zero, applied ONCE per component          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The total is the exact sum of the rounded components, so the stored
//! sale always balances.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, SurchargeRate, TaxRate};

/// One priced line of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLine {
    pub unit_price: Money,
    pub quantity: i64,
}

impl PriceLine {
    pub fn new(unit_price: Money, quantity: i64) -> Self {
        PriceLine {
            unit_price,
            quantity,
        }
    }

    /// unit_price × quantity, or None on overflow.
    pub fn total(&self) -> Option<Money> {
        self.unit_price.checked_multiply_quantity(self.quantity)
    }
}

/// How the tax component is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxBasis {
    /// Percentage of the subtotal.
    Rate(TaxRate),
    /// Amount supplied by the caller, used as-is.
    Fixed(Money),
}

/// Result of [`PricingCalculator::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub surcharge: Money,
    pub discount: Money,
    pub total: Money,
    /// Rate used, when the tax was derived from one.
    pub tax_rate: Option<TaxRate>,
}

/// Stateless order pricing.
pub struct PricingCalculator;

impl PricingCalculator {
    /// Computes subtotal, tax, surcharge, discount and total.
    ///
    /// ## Errors
    /// - negative unit price, explicit tax or discount
    /// - discount larger than `subtotal + surcharge + tax`
    /// - arithmetic overflow
    pub fn compute(
        lines: &[PriceLine],
        tax: TaxBasis,
        surcharge: Option<SurchargeRate>,
        discount: Option<Money>,
    ) -> CoreResult<PricingBreakdown> {
        let mut subtotal = Money::zero();
        for line in lines {
            if line.unit_price.is_negative() {
                return Err(ValidationError::MustNotBeNegative {
                    field: "unit_price".to_string(),
                }
                .into());
            }
            let line_total = line.total().ok_or_else(|| overflow("line total"))?;
            subtotal = subtotal
                .checked_add(line_total)
                .ok_or_else(|| overflow("subtotal"))?;
        }

        let surcharge = subtotal.calculate_surcharge(surcharge.unwrap_or_default());

        let (tax, tax_rate) = match tax {
            TaxBasis::Rate(rate) => (subtotal.calculate_tax(rate), Some(rate)),
            TaxBasis::Fixed(amount) => {
                if amount.is_negative() {
                    return Err(ValidationError::MustNotBeNegative {
                        field: "tax_amount".to_string(),
                    }
                    .into());
                }
                (amount, None)
            }
        };

        let discount = discount.unwrap_or_default();
        if discount.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "discount".to_string(),
            }
            .into());
        }

        let gross = subtotal
            .checked_add(surcharge)
            .and_then(|m| m.checked_add(tax))
            .ok_or_else(|| overflow("total"))?;

        if discount > gross {
            return Err(CoreError::DiscountExceedsTotal {
                discount: discount.cents(),
                gross: gross.cents(),
            });
        }

        Ok(PricingBreakdown {
            subtotal,
            tax,
            surcharge,
            discount,
            total: gross - discount,
            tax_rate,
        })
    }
}

fn overflow(field: &str) -> CoreError {
    CoreError::AmountOverflow {
        field: field.to_string(),
    }
}
