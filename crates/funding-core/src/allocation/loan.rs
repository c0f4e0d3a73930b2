use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FundingError;
use crate::types::{LoanId, Money, Rate, StateCode};
use crate::FundingResult;

/// An immutable funding request.
///
/// `state`, `default_likelihood` and `interest_rate` are optional so that
/// incomplete records can still be represented; covenants that need a
/// missing attribute reject the loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_likelihood: Option<Rate>,
    /// Rate paid by the borrower. Only used for expected-yield reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<Rate>,
}

impl Loan {
    pub fn new(id: impl Into<LoanId>, amount: Money) -> Self {
        Loan {
            id: id.into(),
            amount,
            state: None,
            default_likelihood: None,
            interest_rate: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<StateCode>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_default_likelihood(mut self, likelihood: Rate) -> Self {
        self.default_likelihood = Some(likelihood);
        self
    }

    pub fn with_interest_rate(mut self, rate: Rate) -> Self {
        self.interest_rate = Some(rate);
        self
    }

    /// Reject records the ingestion side should never have handed over.
    pub fn validate(&self) -> FundingResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(FundingError::invalid("loan.id", "must not be empty"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(FundingError::invalid(
                format!("loan[{}].amount", self.id),
                format!("must be positive, got {}", self.amount),
            ));
        }
        if let Some(p) = self.default_likelihood {
            if p < Decimal::ZERO || p > Decimal::ONE {
                return Err(FundingError::invalid(
                    format!("loan[{}].default_likelihood", self.id),
                    format!("must lie in [0, 1], got {p}"),
                ));
            }
        }
        if let Some(r) = self.interest_rate {
            if r < Decimal::ZERO {
                return Err(FundingError::invalid(
                    format!("loan[{}].interest_rate", self.id),
                    format!("must not be negative, got {r}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builder_sets_attributes() {
        let loan = Loan::new("L1", dec!(50))
            .with_state("ca")
            .with_default_likelihood(dec!(0.05))
            .with_interest_rate(dec!(0.15));
        assert_eq!(loan.state, Some(StateCode::new("CA")));
        assert_eq!(loan.default_likelihood, Some(dec!(0.05)));
        assert_eq!(loan.interest_rate, Some(dec!(0.15)));
        assert!(loan.validate().is_ok());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = Loan::new("L1", Decimal::ZERO).validate().unwrap_err();
        assert!(matches!(err, FundingError::InvalidInput { .. }));
    }

    #[test]
    fn test_likelihood_out_of_range_rejected() {
        let loan = Loan::new("L1", dec!(10)).with_default_likelihood(dec!(1.2));
        let err = loan.validate().unwrap_err();
        assert!(err.to_string().contains("default_likelihood"));
    }

    #[test]
    fn test_likelihood_bounds_inclusive() {
        assert!(Loan::new("a", dec!(1))
            .with_default_likelihood(Decimal::ZERO)
            .validate()
            .is_ok());
        assert!(Loan::new("b", dec!(1))
            .with_default_likelihood(Decimal::ONE)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let loan: Loan = serde_json::from_str(r#"{"id":"7","amount":"125.50"}"#).unwrap();
        assert_eq!(loan.amount, dec!(125.50));
        assert!(loan.state.is_none());
        assert!(loan.default_likelihood.is_none());
    }
}
