use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use crate::error::FundingError;
use crate::types::*;
use crate::FundingResult;

use super::covenant::CovenantRule;
use super::engine::AssignmentEngine;
use super::facility::{Bank, Facility, FacilityScreen};
use super::ledger::{AssignmentRecord, Outcome};
use super::loan::Loan;
use super::ranking::TieBreakWeights;

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSpec {
    pub id: BankId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitySpec {
    pub id: FacilityId,
    pub bank_id: BankId,
    pub interest_rate: Rate,
    /// Opening capacity.
    #[serde(alias = "amount")]
    pub capacity: Money,
}

/// A covenant bound to a bank, or to one facility of that bank when
/// `facility_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantSpec {
    pub bank_id: BankId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<FacilityId>,
    pub rule: CovenantRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    pub banks: Vec<BankSpec>,
    pub facilities: Vec<FacilitySpec>,
    #[serde(default)]
    pub covenants: Vec<CovenantSpec>,
    /// Loans in arrival order.
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub weights: TieBreakWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitySummary {
    pub facility_id: FacilityId,
    pub bank_id: BankId,
    pub interest_rate: Rate,
    pub initial_capacity: Money,
    pub remaining_capacity: Money,
    /// Drawn share of initial capacity.
    pub utilisation: Rate,
    pub loans_assigned: u64,
    /// Summed expected yield, rounded half-to-even to whole units.
    pub expected_yield: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutput {
    pub assignments: Vec<AssignmentRecord>,
    pub facilities: Vec<FacilitySummary>,
    pub loans_assigned: usize,
    pub loans_declined: usize,
    pub total_funded: Money,
    pub total_expected_yield: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenOutput {
    pub loan_id: LoanId,
    /// Arrival position of the loan in the input stream.
    pub sequence: u64,
    pub screens: Vec<FacilityScreen>,
    pub eligible_count: usize,
    /// What the engine did with the loan at that point in the stream.
    pub outcome: AssignmentRecord,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate the records and wire them into an engine.
pub fn build_engine(input: &AllocationInput) -> FundingResult<AssignmentEngine> {
    let mut bank_ids: BTreeSet<&BankId> = BTreeSet::new();
    for bank in &input.banks {
        if !bank_ids.insert(&bank.id) {
            return Err(FundingError::invalid(
                format!("bank[{}]", bank.id),
                "duplicate bank id",
            ));
        }
    }

    let mut facility_bank: BTreeMap<&FacilityId, &BankId> = BTreeMap::new();
    for facility in &input.facilities {
        if !bank_ids.contains(&facility.bank_id) {
            return Err(FundingError::invalid(
                format!("facility[{}].bank_id", facility.id),
                format!("unknown bank {}", facility.bank_id),
            ));
        }
        if facility_bank.insert(&facility.id, &facility.bank_id).is_some() {
            return Err(FundingError::invalid(
                format!("facility[{}]", facility.id),
                "duplicate facility id",
            ));
        }
    }

    for (i, cov) in input.covenants.iter().enumerate() {
        if !bank_ids.contains(&cov.bank_id) {
            return Err(FundingError::invalid(
                format!("covenant[{i}].bank_id"),
                format!("unknown bank {}", cov.bank_id),
            ));
        }
        if let Some(fid) = &cov.facility_id {
            match facility_bank.get(fid) {
                None => {
                    return Err(FundingError::invalid(
                        format!("covenant[{i}].facility_id"),
                        format!("unknown facility {fid}"),
                    ))
                }
                Some(owner) if **owner != cov.bank_id => {
                    return Err(FundingError::invalid(
                        format!("covenant[{i}].facility_id"),
                        format!("facility {fid} belongs to bank {owner}, not {}", cov.bank_id),
                    ))
                }
                Some(_) => {}
            }
        }
        cov.rule.validate()?;
    }

    let mut banks: BTreeMap<BankId, Arc<Bank>> = BTreeMap::new();
    for spec in &input.banks {
        let mut bank = Bank::new(spec.id.clone());
        if let Some(name) = &spec.name {
            bank = bank.with_name(name.clone());
        }
        for facility in input.facilities.iter().filter(|f| f.bank_id == spec.id) {
            bank = bank.with_facility(facility.id.clone());
        }
        for cov in input
            .covenants
            .iter()
            .filter(|c| c.bank_id == spec.id && c.facility_id.is_none())
        {
            bank = bank.with_covenant(cov.rule.build());
        }
        banks.insert(spec.id.clone(), Arc::new(bank));
    }

    let mut facilities = Vec::with_capacity(input.facilities.len());
    for spec in &input.facilities {
        let bank = banks.get(&spec.bank_id).cloned().ok_or_else(|| {
            FundingError::invalid(
                format!("facility[{}].bank_id", spec.id),
                format!("unknown bank {}", spec.bank_id),
            )
        })?;
        let mut facility = Facility::new(spec.id.clone(), bank, spec.interest_rate, spec.capacity)?;
        for cov in input
            .covenants
            .iter()
            .filter(|c| c.facility_id.as_ref() == Some(&spec.id))
        {
            facility = facility.with_covenant(cov.rule.build());
        }
        facilities.push(facility);
    }

    AssignmentEngine::new(facilities, input.weights.clone())
}

/// Stream every loan through a fresh engine in input order.
pub fn run_allocation(
    input: &AllocationInput,
) -> FundingResult<ComputationOutput<AllocationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.facilities.is_empty() {
        warnings.push("No facilities supplied; every loan will be declined.".into());
    }

    let engine = build_engine(input)?;
    let assignments = engine.assign_all(input.loans.iter().cloned())?;

    let mut total_funded = Decimal::ZERO;
    for (record, loan) in assignments.iter().zip(&input.loans) {
        if let Outcome::Assigned { amount, .. } = &record.outcome {
            total_funded += *amount;
        }
        record_warnings(record, loan, &mut warnings);
    }

    let facilities = summarise_facilities(&engine)?;
    let total_expected_yield: Money = facilities.iter().map(|f| f.expected_yield).sum();

    let output = AllocationOutput {
        loans_assigned: engine.ledger().assigned_count()?,
        loans_declined: engine.ledger().declined_count()?,
        assignments,
        facilities,
        total_funded,
        total_expected_yield,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "ranking": "interest rate ascending, tie-break score descending, facility id ascending",
        "capacity_weight": input.weights.capacity_weight.to_string(),
        "scarcity_weight": input.weights.scarcity_weight.to_string(),
        "facility_count": input.facilities.len(),
        "loan_count": input.loans.len(),
    });

    Ok(with_metadata(
        "Greedy streaming assignment (cheapest eligible facility, capacity/scarcity tie-break)",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Replay the stream up to `loan_id`, then explain per facility whether
/// that loan could be funded and what the engine did with it.
pub fn screen_loan(
    input: &AllocationInput,
    loan_id: &LoanId,
) -> FundingResult<ComputationOutput<ScreenOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let position = input
        .loans
        .iter()
        .position(|l| &l.id == loan_id)
        .ok_or_else(|| FundingError::invalid("loan_id", format!("unknown loan {loan_id}")))?;

    let engine = build_engine(input)?;
    engine.assign_all(input.loans[..position].iter().cloned())?;

    let loan = input.loans[position].clone();
    let screens = engine.screen_loan(&loan)?;
    let eligible_count = screens.iter().filter(|s| s.eligible).count();
    if eligible_count == 0 {
        warnings.push(format!("Loan {loan_id} has no eligible facility at arrival."));
    }
    let outcome = engine.assign_loan(loan)?;

    let output = ScreenOutput {
        loan_id: loan_id.clone(),
        sequence: outcome.sequence,
        screens,
        eligible_count,
        outcome,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "loans_replayed": position,
        "capacity_weight": input.weights.capacity_weight.to_string(),
        "scarcity_weight": input.weights.scarcity_weight.to_string(),
    });

    Ok(with_metadata(
        "Facility eligibility screening at loan arrival",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn record_warnings(record: &AssignmentRecord, loan: &Loan, warnings: &mut Vec<String>) {
    if !record.passed_over.is_empty() {
        let ids: Vec<&str> = record.passed_over.iter().map(FacilityId::as_str).collect();
        warnings.push(format!(
            "Loan {}: facility {} failed re-validation at commit; fell back to the next candidate.",
            record.loan_id,
            ids.join(", ")
        ));
    }
    match &record.outcome {
        Outcome::Assigned {
            expected_yield: None,
            ..
        } => {
            warnings.push(format!(
                "Loan {}: default likelihood or interest rate missing; expected yield not computed.",
                loan.id
            ));
        }
        Outcome::Assigned { .. } => {}
        Outcome::Declined { reason } => {
            warnings.push(format!(
                "Loan {} (amount {}) declined: {}.",
                record.loan_id, loan.amount, reason
            ));
        }
    }
}

fn summarise_facilities(engine: &AssignmentEngine) -> FundingResult<Vec<FacilitySummary>> {
    engine
        .facilities()
        .map(|facility| {
            let position = engine.ledger().position_of(&facility.id)?.unwrap_or_default();
            let remaining = facility.remaining_capacity()?;
            let utilisation = if facility.initial_capacity.is_zero() {
                Decimal::ZERO
            } else {
                (facility.initial_capacity - remaining) / facility.initial_capacity
            };
            Ok(FacilitySummary {
                facility_id: facility.id.clone(),
                bank_id: facility.bank.id.clone(),
                interest_rate: facility.interest_rate,
                initial_capacity: facility.initial_capacity,
                remaining_capacity: remaining,
                utilisation,
                loans_assigned: position.loans_assigned,
                expected_yield: position.expected_yield.round_dp(0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_input() -> AllocationInput {
        AllocationInput {
            banks: vec![
                BankSpec {
                    id: "1".into(),
                    name: Some("Chase".into()),
                },
                BankSpec {
                    id: "2".into(),
                    name: Some("Bank of America".into()),
                },
            ],
            facilities: vec![
                FacilitySpec {
                    id: "1".into(),
                    bank_id: "1".into(),
                    interest_rate: dec!(0.07),
                    capacity: dec!(61104),
                },
                FacilitySpec {
                    id: "2".into(),
                    bank_id: "2".into(),
                    interest_rate: dec!(0.06),
                    capacity: dec!(126122),
                },
            ],
            covenants: vec![
                CovenantSpec {
                    bank_id: "1".into(),
                    facility_id: None,
                    rule: CovenantRule::BannedStates {
                        states: vec!["MT".into()],
                    },
                },
                CovenantSpec {
                    bank_id: "2".into(),
                    facility_id: Some("2".into()),
                    rule: CovenantRule::MaxDefaultLikelihood {
                        threshold: dec!(0.09),
                    },
                },
                CovenantSpec {
                    bank_id: "2".into(),
                    facility_id: Some("2".into()),
                    rule: CovenantRule::BannedStates {
                        states: vec!["VT".into()],
                    },
                },
            ],
            loans: vec![
                Loan::new("1", dec!(10552))
                    .with_interest_rate(dec!(0.15))
                    .with_default_likelihood(dec!(0.02))
                    .with_state("MO"),
                Loan::new("2", dec!(51157))
                    .with_interest_rate(dec!(0.15))
                    .with_default_likelihood(dec!(0.11))
                    .with_state("VT"),
                Loan::new("3", dec!(74965))
                    .with_interest_rate(dec!(0.35))
                    .with_default_likelihood(dec!(0.06))
                    .with_state("AL"),
                Loan::new("4", dec!(500000))
                    .with_interest_rate(dec!(0.2))
                    .with_default_likelihood(dec!(0.01))
                    .with_state("CA"),
            ],
            weights: TieBreakWeights::default(),
        }
    }

    #[test]
    fn test_allocation_routes_by_rate_and_covenant() {
        let out = run_allocation(&sample_input()).unwrap();
        let r = &out.result;
        let routed: Vec<Option<&str>> = r
            .assignments
            .iter()
            .map(|a| a.assigned_facility().map(FacilityId::as_str))
            .collect();
        // Loan 1 takes the cheaper facility 2; loan 2 fails facility 2's
        // covenants and lands on facility 1; loan 3 fits facility 2; loan 4
        // is too large for either.
        assert_eq!(routed, vec![Some("2"), Some("1"), Some("2"), None]);
        assert_eq!(r.loans_assigned, 3);
        assert_eq!(r.loans_declined, 1);
        assert_eq!(r.total_funded, dec!(136674));
    }

    #[test]
    fn test_facility_summaries() {
        let out = run_allocation(&sample_input()).unwrap();
        let f2 = &out.result.facilities[1];
        assert_eq!(f2.facility_id.as_str(), "2");
        assert_eq!(f2.remaining_capacity, dec!(126122) - dec!(10552) - dec!(74965));
        assert_eq!(f2.loans_assigned, 2);
        // Loan 1: 0.98*0.15*10552 - 0.02*10552 - 0.06*10552 = 706.984
        // Loan 3: 0.94*0.35*74965 - 0.06*74965 - 0.06*74965 = 15667.685
        assert_eq!(f2.expected_yield, dec!(16375));
        let f1 = &out.result.facilities[0];
        // 0.89*0.15*51157 - 0.11*51157 - 0.07*51157 = -2378.8005
        assert_eq!(f1.expected_yield, dec!(-2379));
        assert_eq!(out.result.total_expected_yield, dec!(13996));
    }

    #[test]
    fn test_decline_surfaces_as_warning() {
        let out = run_allocation(&sample_input()).unwrap();
        assert!(out
            .warnings
            .iter()
            .any(|w| w.contains("Loan 4") && w.contains("insufficient capacity")));
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
        assert!(!out.methodology.is_empty());
    }

    #[test]
    fn test_identical_runs_identical_ledgers() {
        let a = run_allocation(&sample_input()).unwrap();
        let b = run_allocation(&sample_input()).unwrap();
        assert_eq!(
            serde_json::to_string(&a.result.assignments).unwrap(),
            serde_json::to_string(&b.result.assignments).unwrap()
        );
    }

    #[test]
    fn test_fallback_surfaces_as_warning() {
        let loan = Loan::new("9", dec!(100))
            .with_interest_rate(dec!(0.1))
            .with_default_likelihood(dec!(0.01));
        let record = AssignmentRecord {
            sequence: 4,
            loan_id: loan.id.clone(),
            outcome: Outcome::Assigned {
                facility_id: "2".into(),
                bank_id: "2".into(),
                rate: dec!(0.06),
                amount: dec!(100),
                expected_yield: Some(dec!(1)),
            },
            passed_over: vec!["1".into()],
        };
        let mut warnings = Vec::new();
        record_warnings(&record, &loan, &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Loan 9: facility 1 failed re-validation"));
    }

    #[test]
    fn test_clean_run_has_no_fallback_warnings() {
        let out = run_allocation(&sample_input()).unwrap();
        assert!(out.result.assignments.iter().all(|a| a.passed_over.is_empty()));
        assert!(!out.warnings.iter().any(|w| w.contains("re-validation")));
    }

    #[test]
    fn test_unknown_bank_rejected() {
        let mut input = sample_input();
        input.facilities[0].bank_id = "99".into();
        let err = build_engine(&input).unwrap_err();
        assert!(err.to_string().contains("unknown bank 99"));
    }

    #[test]
    fn test_covenant_on_foreign_facility_rejected() {
        let mut input = sample_input();
        input.covenants[1].bank_id = "1".into();
        let err = build_engine(&input).unwrap_err();
        assert!(matches!(err, FundingError::InvalidInput { .. }));
    }

    #[test]
    fn test_duplicate_loan_in_stream_is_error() {
        let mut input = sample_input();
        let dup = input.loans[0].clone();
        input.loans.push(dup);
        let err = run_allocation(&input).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_screen_replays_prefix() {
        let out = screen_loan(&sample_input(), &LoanId::new("2")).unwrap();
        let r = &out.result;
        assert_eq!(r.sequence, 1);
        assert_eq!(r.eligible_count, 1);
        let f2 = r.screens.iter().find(|s| s.facility_id.as_str() == "2").unwrap();
        assert_eq!(f2.failed_covenants.len(), 2);
        // Facility 2 has already funded loan 1.
        assert_eq!(f2.remaining_capacity, dec!(126122) - dec!(10552));
        assert_eq!(r.outcome.assigned_facility(), Some(&FacilityId::new("1")));
    }

    #[test]
    fn test_screen_unknown_loan() {
        let err = screen_loan(&sample_input(), &LoanId::new("nope")).unwrap_err();
        assert!(matches!(err, FundingError::InvalidInput { .. }));
    }

    #[test]
    fn test_input_json_shape() {
        let json = r#"{
            "banks": [{"id": "b"}],
            "facilities": [{"id": "f", "bank_id": "b", "interest_rate": "0.04", "amount": "100"}],
            "covenants": [{"bank_id": "b", "rule": {"kind": "allowed_states", "states": ["ca"]}}],
            "loans": [{"id": "l", "amount": "5", "state": "CA"}]
        }"#;
        let input: AllocationInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.facilities[0].capacity, dec!(100));
        assert_eq!(input.weights, TieBreakWeights::default());
        let out = run_allocation(&input).unwrap();
        assert_eq!(out.result.loans_assigned, 1);
        assert!(out.warnings.iter().any(|w| w.contains("expected yield not computed")));
    }
}
