use funding_core::allocation::covenant::{BannedStates, MaxDefaultLikelihood};
use funding_core::allocation::{AssignmentEngine, Bank, Facility, Loan, Outcome, TieBreakWeights};
use funding_core::{FacilityId, StateCode};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const STATES: [&str; 4] = ["CA", "NY", "TX", "MT"];

#[derive(Debug, Clone)]
struct LoanCase {
    amount: u32,
    likelihood_pct: u32,
    state: usize,
}

fn loan_case() -> impl Strategy<Value = LoanCase> {
    (1u32..400, 0u32..=100, 0usize..STATES.len()).prop_map(|(amount, likelihood_pct, state)| {
        LoanCase {
            amount,
            likelihood_pct,
            state,
        }
    })
}

fn build_engine(
    capacities: &[u32],
    rates_bps: &[u32],
    weights: TieBreakWeights,
) -> AssignmentEngine {
    let banned: BTreeSet<StateCode> = [StateCode::new("MT")].into_iter().collect();
    let b1 = Arc::new(Bank::new("B1").with_covenant(Box::new(BannedStates { states: banned })));
    let b2 = Arc::new(Bank::new("B2"));

    let facilities = capacities
        .iter()
        .zip(rates_bps)
        .enumerate()
        .map(|(i, (cap, bps))| {
            let bank = if i % 2 == 0 { &b1 } else { &b2 };
            let f = Facility::new(
                format!("F{i}"),
                Arc::clone(bank),
                Decimal::new(*bps as i64, 4),
                Decimal::from(*cap),
            )
            .unwrap();
            if i % 3 == 0 {
                f.with_covenant(Box::new(MaxDefaultLikelihood {
                    threshold: Decimal::new(30, 2),
                }))
            } else {
                f
            }
        })
        .collect();
    AssignmentEngine::new(facilities, weights).unwrap()
}

fn to_loan(i: usize, case: &LoanCase) -> Loan {
    Loan::new(format!("L{i}"), Decimal::from(case.amount))
        .with_default_likelihood(Decimal::new(case.likelihood_pct as i64, 2))
        .with_state(STATES[case.state])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn capacity_stays_within_bounds(
        capacities in prop::collection::vec(0u32..2000, 1..6),
        rates in prop::collection::vec(100u32..900, 6),
        loans in prop::collection::vec(loan_case(), 0..60),
    ) {
        let engine = build_engine(&capacities, &rates, TieBreakWeights::default());
        for (i, case) in loans.iter().enumerate() {
            engine.assign_loan(to_loan(i, case)).unwrap();
            for f in engine.facilities() {
                let remaining = f.remaining_capacity().unwrap();
                prop_assert!(remaining >= Decimal::ZERO);
                prop_assert!(remaining <= f.initial_capacity);
                prop_assert_eq!(engine.facility_capacity(&f.id).unwrap(), Some(remaining));
            }
        }
        prop_assert_eq!(engine.ledger().len().unwrap(), loans.len());
    }

    #[test]
    fn assignments_are_cheapest_eligible_and_drawn_amounts_add_up(
        capacities in prop::collection::vec(0u32..2000, 1..6),
        rates in prop::collection::vec(100u32..900, 6),
        loans in prop::collection::vec(loan_case(), 0..60),
    ) {
        let engine = build_engine(&capacities, &rates, TieBreakWeights::default());
        let mut drawn: BTreeMap<FacilityId, Decimal> = BTreeMap::new();

        for (i, case) in loans.iter().enumerate() {
            let loan = to_loan(i, case);
            let screens = engine.screen_loan(&loan).unwrap();
            let best_rate = screens
                .iter()
                .filter(|s| s.eligible)
                .map(|s| s.interest_rate)
                .min();

            let rec = engine.assign_loan(loan.clone()).unwrap();
            match &rec.outcome {
                Outcome::Assigned { facility_id, rate, amount, .. } => {
                    prop_assert_eq!(Some(*rate), best_rate);
                    prop_assert_eq!(*amount, loan.amount);
                    let f = engine.facility(facility_id).unwrap();
                    prop_assert!(f.covenants_satisfied_by(&loan));
                    *drawn.entry(facility_id.clone()).or_default() += loan.amount;
                }
                Outcome::Declined { .. } => {
                    prop_assert!(best_rate.is_none());
                }
            }
        }

        for f in engine.facilities() {
            let used = drawn.get(&f.id).copied().unwrap_or_default();
            prop_assert_eq!(f.initial_capacity - f.remaining_capacity().unwrap(), used);
        }
    }

    #[test]
    fn runs_are_reproducible(
        capacities in prop::collection::vec(0u32..2000, 1..6),
        rates in prop::collection::vec(100u32..900, 6),
        loans in prop::collection::vec(loan_case(), 0..40),
        scarcity_pct in 0u32..300,
    ) {
        let weights = TieBreakWeights {
            capacity_weight: Decimal::ONE,
            scarcity_weight: Decimal::new(scarcity_pct as i64, 2),
        };
        let run = || {
            let engine = build_engine(&capacities, &rates, weights.clone());
            let records = engine
                .assign_all(loans.iter().enumerate().map(|(i, c)| to_loan(i, c)))
                .unwrap();
            serde_json::to_string(&records).unwrap()
        };
        prop_assert_eq!(run(), run());
    }
}
