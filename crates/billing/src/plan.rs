//! Subscription plans

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

/// Billing plan selected at checkout
///
/// Parsing happens before any customer lookup or Stripe call so an invalid
/// planType is a pure user error with no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Annual,
}

impl PlanType {
    pub fn parse(s: &str) -> BillingResult<Self> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "annual" => Ok(Self::Annual),
            other => Err(BillingError::InvalidPlan(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_allowed_plans() {
        assert_eq!(PlanType::parse("monthly").unwrap(), PlanType::Monthly);
        assert_eq!(PlanType::parse("annual").unwrap(), PlanType::Annual);
    }

    #[test]
    fn rejects_anything_else() {
        for bad in ["weekly", "MONTHLY", "yearly", "", "annual "] {
            assert!(
                matches!(PlanType::parse(bad), Err(BillingError::InvalidPlan(_))),
                "'{bad}' should be rejected"
            );
        }
    }
}
