use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::error::FundingError;
use crate::types::{Money, Rate, StateCode};
use crate::FundingResult;

use super::loan::Loan;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A single eligibility rule.
///
/// Facilities, banks and the engine only ever hold `Box<dyn Covenant>`, so a
/// new kind of rule needs nothing more than an implementation of this trait
/// (and a [`CovenantRule`] variant if it must be constructible from data).
/// Evaluation is pure and infallible: a rule that cannot be evaluated
/// against a loan returns `false`.
pub trait Covenant: Debug + Send + Sync {
    fn is_satisfied_by(&self, loan: &Loan) -> bool;

    /// Human-readable form used in eligibility screening reports.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// Built-in kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MaxDefaultLikelihood {
    pub threshold: Rate,
}

impl Covenant for MaxDefaultLikelihood {
    fn is_satisfied_by(&self, loan: &Loan) -> bool {
        match loan.default_likelihood {
            Some(p) => p <= self.threshold,
            None => false,
        }
    }

    fn describe(&self) -> String {
        format!("default likelihood <= {}", self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllowedStates {
    pub states: BTreeSet<StateCode>,
}

impl Covenant for AllowedStates {
    fn is_satisfied_by(&self, loan: &Loan) -> bool {
        loan.state
            .as_ref()
            .is_some_and(|s| self.states.contains(s))
    }

    fn describe(&self) -> String {
        format!("state in {{{}}}", join_states(&self.states))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BannedStates {
    pub states: BTreeSet<StateCode>,
}

impl Covenant for BannedStates {
    fn is_satisfied_by(&self, loan: &Loan) -> bool {
        loan.state
            .as_ref()
            .is_some_and(|s| !self.states.contains(s))
    }

    fn describe(&self) -> String {
        format!("state not in {{{}}}", join_states(&self.states))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaxLoanAmount {
    pub limit: Money,
}

impl Covenant for MaxLoanAmount {
    fn is_satisfied_by(&self, loan: &Loan) -> bool {
        loan.amount <= self.limit
    }

    fn describe(&self) -> String {
        format!("loan amount <= {}", self.limit)
    }
}

fn join_states(states: &BTreeSet<StateCode>) -> String {
    states
        .iter()
        .map(StateCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Variant registry
// ---------------------------------------------------------------------------

/// Data form of every covenant kind the ingestion side can express.
///
/// This is the only place that knows the concrete kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CovenantRule {
    MaxDefaultLikelihood { threshold: Rate },
    AllowedStates { states: Vec<StateCode> },
    BannedStates { states: Vec<StateCode> },
    MaxLoanAmount { limit: Money },
}

impl CovenantRule {
    pub fn validate(&self) -> FundingResult<()> {
        match self {
            CovenantRule::MaxDefaultLikelihood { threshold } => {
                if threshold.is_sign_negative() || *threshold > Decimal::ONE {
                    return Err(FundingError::invalid(
                        "covenant.max_default_likelihood",
                        format!("threshold must lie in [0, 1], got {threshold}"),
                    ));
                }
            }
            CovenantRule::AllowedStates { states } | CovenantRule::BannedStates { states } => {
                if states.is_empty() {
                    return Err(FundingError::invalid(
                        "covenant.states",
                        "at least one state code is required",
                    ));
                }
            }
            CovenantRule::MaxLoanAmount { limit } => {
                if limit.is_sign_negative() {
                    return Err(FundingError::invalid(
                        "covenant.max_loan_amount",
                        format!("limit must not be negative, got {limit}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Box<dyn Covenant> {
        match self {
            CovenantRule::MaxDefaultLikelihood { threshold } => Box::new(MaxDefaultLikelihood {
                threshold: *threshold,
            }),
            CovenantRule::AllowedStates { states } => Box::new(AllowedStates {
                states: states.iter().cloned().collect(),
            }),
            CovenantRule::BannedStates { states } => Box::new(BannedStates {
                states: states.iter().cloned().collect(),
            }),
            CovenantRule::MaxLoanAmount { limit } => Box::new(MaxLoanAmount { limit: *limit }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn loan() -> Loan {
        Loan::new("L1", dec!(100))
            .with_state("CA")
            .with_default_likelihood(dec!(0.15))
    }

    #[test]
    fn test_max_default_likelihood_inclusive() {
        let cov = MaxDefaultLikelihood { threshold: dec!(0.15) };
        assert!(cov.is_satisfied_by(&loan()));
        let tighter = MaxDefaultLikelihood { threshold: dec!(0.1) };
        assert!(!tighter.is_satisfied_by(&loan()));
    }

    #[test]
    fn test_max_default_likelihood_fails_closed_when_missing() {
        let cov = MaxDefaultLikelihood { threshold: dec!(1) };
        let bare = Loan::new("L2", dec!(10));
        assert!(!cov.is_satisfied_by(&bare));
    }

    #[test]
    fn test_allowed_states() {
        let cov = CovenantRule::AllowedStates {
            states: vec!["CA".into(), "NY".into()],
        }
        .build();
        assert!(cov.is_satisfied_by(&loan()));
        assert!(!cov.is_satisfied_by(&loan().with_state("TX")));
        assert!(!cov.is_satisfied_by(&Loan::new("L3", dec!(1))));
    }

    #[test]
    fn test_banned_states() {
        let cov = CovenantRule::BannedStates {
            states: vec!["ca".into()],
        }
        .build();
        assert!(!cov.is_satisfied_by(&loan()));
        assert!(cov.is_satisfied_by(&loan().with_state("NV")));
        // Unknown origination cannot be cleared against a ban list.
        assert!(!cov.is_satisfied_by(&Loan::new("L3", dec!(1))));
    }

    #[test]
    fn test_max_loan_amount() {
        let cov = MaxLoanAmount { limit: dec!(100) };
        assert!(cov.is_satisfied_by(&loan()));
        assert!(!cov.is_satisfied_by(&Loan::new("big", dec!(100.01))));
    }

    #[test]
    fn test_describe_lists_states_sorted() {
        let cov = CovenantRule::BannedStates {
            states: vec!["NY".into(), "AL".into()],
        }
        .build();
        assert_eq!(cov.describe(), "state not in {AL, NY}");
    }

    #[test]
    fn test_rule_serde_tagged() {
        let rule: CovenantRule =
            serde_json::from_str(r#"{"kind":"max_default_likelihood","threshold":"0.2"}"#)
                .unwrap();
        assert_eq!(
            rule,
            CovenantRule::MaxDefaultLikelihood {
                threshold: dec!(0.2)
            }
        );
    }

    #[test]
    fn test_rule_validation() {
        assert!(CovenantRule::MaxDefaultLikelihood { threshold: dec!(1.5) }
            .validate()
            .is_err());
        assert!(CovenantRule::AllowedStates { states: vec![] }
            .validate()
            .is_err());
        assert!(CovenantRule::MaxLoanAmount { limit: dec!(-1) }
            .validate()
            .is_err());
        assert!(CovenantRule::BannedStates {
            states: vec!["MT".into()]
        }
        .validate()
        .is_ok());
    }

    #[derive(Debug)]
    struct EvenAmountsOnly;

    impl Covenant for EvenAmountsOnly {
        fn is_satisfied_by(&self, loan: &Loan) -> bool {
            (loan.amount % dec!(2)).is_zero()
        }

        fn describe(&self) -> String {
            "even amounts only".into()
        }
    }

    #[test]
    fn test_custom_kind_is_a_plain_trait_impl() {
        let covs: Vec<Box<dyn Covenant>> = vec![
            Box::new(EvenAmountsOnly),
            Box::new(MaxLoanAmount { limit: dec!(500) }),
        ];
        assert!(covs.iter().all(|c| c.is_satisfied_by(&loan())));
        let odd = Loan::new("odd", dec!(101));
        assert!(!covs.iter().all(|c| c.is_satisfied_by(&odd)));
    }
}
