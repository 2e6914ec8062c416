//! # Pricing Policy
//!
//! Tax and payment configuration the sale service prices against.
//!
//! The service only sees `Arc<dyn PricingPolicy>`; the API binary builds a
//! [`StaticPricingPolicy`] from its config file.

use branchpos_core::validation::{validate_installments, validate_rate_bps};
use branchpos_core::{PaymentMethod, PaymentSelection, SurchargeRate, TaxRate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Source of the system tax rate and payment surcharges.
pub trait PricingPolicy: Send + Sync {
    /// Rate applied when neither the request nor the branch sets one.
    fn system_tax_rate(&self) -> TaxRate;

    /// Surcharge for a payment selection.
    ///
    /// No selection and cash pay nothing. A selection with no configured
    /// plan is rejected unless it is a single installment.
    fn surcharge_for(&self, payment: Option<&PaymentSelection>) -> EngineResult<SurchargeRate>;
}

/// One configured `{method, installments} → surcharge` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub method: PaymentMethod,
    pub installments: u32,
    pub surcharge_bps: u32,
}

impl PaymentPlan {
    pub fn new(method: PaymentMethod, installments: u32, surcharge_bps: u32) -> Self {
        PaymentPlan {
            method,
            installments,
            surcharge_bps,
        }
    }
}

/// Fixed tax rate plus a table of payment plans.
#[derive(Debug, Clone)]
pub struct StaticPricingPolicy {
    tax_rate: TaxRate,
    plans: Vec<PaymentPlan>,
}

impl StaticPricingPolicy {
    pub fn new(tax_rate: TaxRate) -> Self {
        StaticPricingPolicy {
            tax_rate,
            plans: Vec::new(),
        }
    }

    /// Adds plans, checking installments and surcharge ranges.
    pub fn with_plans(mut self, plans: Vec<PaymentPlan>) -> EngineResult<Self> {
        for plan in &plans {
            validate_installments(plan.installments)?;
            validate_rate_bps("surcharge_bps", plan.surcharge_bps)?;
        }
        self.plans = plans;
        Ok(self)
    }

    pub fn plans(&self) -> &[PaymentPlan] {
        &self.plans
    }
}

impl PricingPolicy for StaticPricingPolicy {
    fn system_tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    fn surcharge_for(&self, payment: Option<&PaymentSelection>) -> EngineResult<SurchargeRate> {
        let payment = match payment {
            Some(payment) => payment,
            None => return Ok(SurchargeRate::none()),
        };

        validate_installments(payment.installments)?;

        if payment.method == PaymentMethod::Cash {
            if payment.installments != 1 {
                return Err(EngineError::Validation(
                    "cash payments cannot be split into installments".to_string(),
                ));
            }
            return Ok(SurchargeRate::none());
        }

        let plan = self
            .plans
            .iter()
            .find(|p| p.method == payment.method && p.installments == payment.installments);

        match plan {
            Some(plan) => Ok(SurchargeRate::from_bps(plan.surcharge_bps)),
            None if payment.installments == 1 => Ok(SurchargeRate::none()),
            None => Err(EngineError::Validation(format!(
                "no payment plan for {} in {} installments",
                payment.method.as_str(),
                payment.installments
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> StaticPricingPolicy {
        StaticPricingPolicy::new(TaxRate::from_bps(2100))
            .with_plans(vec![
                PaymentPlan::new(PaymentMethod::CreditCard, 3, 1000),
                PaymentPlan::new(PaymentMethod::CreditCard, 6, 1800),
            ])
            .unwrap()
    }

    #[test]
    fn test_no_selection_and_cash_are_free() {
        let policy = policy();
        assert!(policy.surcharge_for(None).unwrap().is_zero());
        assert!(policy
            .surcharge_for(Some(&PaymentSelection::cash()))
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_configured_plan() {
        let policy = policy();
        let selection = PaymentSelection::new(PaymentMethod::CreditCard, 6);
        assert_eq!(policy.surcharge_for(Some(&selection)).unwrap().bps(), 1800);
    }

    #[test]
    fn test_single_installment_without_plan() {
        let policy = policy();
        let selection = PaymentSelection::new(PaymentMethod::DebitCard, 1);
        assert!(policy.surcharge_for(Some(&selection)).unwrap().is_zero());
    }

    #[test]
    fn test_unknown_plan_is_rejected() {
        let policy = policy();
        let selection = PaymentSelection::new(PaymentMethod::CreditCard, 12);
        let err = policy.surcharge_for(Some(&selection)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let split_cash = PaymentSelection::new(PaymentMethod::Cash, 3);
        assert!(policy.surcharge_for(Some(&split_cash)).is_err());
    }

    #[test]
    fn test_invalid_plans_are_rejected() {
        let result = StaticPricingPolicy::new(TaxRate::zero())
            .with_plans(vec![PaymentPlan::new(PaymentMethod::CreditCard, 0, 100)]);
        assert!(result.is_err());

        let result = StaticPricingPolicy::new(TaxRate::zero())
            .with_plans(vec![PaymentPlan::new(PaymentMethod::CreditCard, 3, 10_001)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_system_tax_rate() {
        assert_eq!(policy().system_tax_rate().bps(), 2100);
    }
}
