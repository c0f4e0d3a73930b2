use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::FundingError;
use crate::types::{FacilityId, Money, Rate};
use crate::FundingResult;

use super::facility::Facility;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Weights of the equal-rate tie-break score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieBreakWeights {
    /// Weight on post-assignment headroom as a fraction of initial capacity.
    #[serde(default = "default_weight")]
    pub capacity_weight: Decimal,
    /// Weight on the facility's historical scarcity.
    #[serde(default = "default_weight")]
    pub scarcity_weight: Decimal,
}

fn default_weight() -> Decimal {
    Decimal::ONE
}

impl Default for TieBreakWeights {
    fn default() -> Self {
        TieBreakWeights {
            capacity_weight: Decimal::ONE,
            scarcity_weight: Decimal::ONE,
        }
    }
}

impl TieBreakWeights {
    pub fn validate(&self) -> FundingResult<()> {
        if self.capacity_weight.is_sign_negative() {
            return Err(FundingError::invalid(
                "weights.capacity_weight",
                "must not be negative",
            ));
        }
        if self.scarcity_weight.is_sign_negative() {
            return Err(FundingError::invalid(
                "weights.scarcity_weight",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Demand tracking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandStats {
    /// Loans whose covenants this facility accepted.
    pub accepted: u64,
    /// Sum of `1 / (number of facilities accepting the loan)` over those loans.
    pub exclusivity: Decimal,
}

impl DemandStats {
    pub fn scarcity(&self) -> Decimal {
        if self.accepted == 0 {
            Decimal::ZERO
        } else {
            self.exclusivity / Decimal::from(self.accepted)
        }
    }
}

/// Running per-facility demand signal, updated in loan arrival order.
#[derive(Debug, Clone, Default)]
pub struct DemandTracker {
    stats: BTreeMap<FacilityId, DemandStats>,
}

impl DemandTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one loan, given every facility whose covenants accepted it
    /// (capacity aside).
    pub fn observe(&mut self, accepting: &[FacilityId]) {
        if accepting.is_empty() {
            return;
        }
        let share = Decimal::ONE / Decimal::from(accepting.len());
        for id in accepting {
            let entry = self.stats.entry(id.clone()).or_default();
            entry.accepted += 1;
            entry.exclusivity += share;
        }
    }

    pub fn scarcity(&self, id: &FacilityId) -> Decimal {
        self.stats
            .get(id)
            .map(DemandStats::scarcity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn stats(&self, id: &FacilityId) -> Option<&DemandStats> {
        self.stats.get(id)
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub facility: &'a Facility,
    pub rate: Rate,
    pub score: Decimal,
}

impl<'a> Candidate<'a> {
    pub fn new(
        facility: &'a Facility,
        remaining: Money,
        amount: Money,
        scarcity: Decimal,
        weights: &TieBreakWeights,
    ) -> Self {
        Candidate {
            facility,
            rate: facility.interest_rate,
            score: desirability(
                remaining,
                amount,
                facility.initial_capacity,
                scarcity,
                weights,
            ),
        }
    }
}

/// Desirability of drawing a loan from a facility among equal-rate peers:
///
/// ```text
/// score(f) = capacity_weight * (remaining(f) - amount(L)) / initial(f)
///          - scarcity_weight * scarcity(f)
/// ```
///
/// `scarcity(f)` is the running mean, over every loan whose covenants `f`
/// accepted, of `1 / (facilities that accepted it)`. A facility that tends to
/// be the only home for its loans scores close to 1 and is held back.
pub fn desirability(
    remaining: Money,
    amount: Money,
    initial_capacity: Money,
    scarcity: Decimal,
    weights: &TieBreakWeights,
) -> Decimal {
    let headroom = if initial_capacity.is_zero() {
        Decimal::ZERO
    } else {
        (remaining - amount) / initial_capacity
    };
    weights.capacity_weight * headroom - weights.scarcity_weight * scarcity
}

/// Total order: rate ascending, score descending, facility id ascending.
pub fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.rate
        .cmp(&b.rate)
        .then_with(|| b.score.cmp(&a.score))
        .then_with(|| a.facility.id.cmp(&b.facility.id))
}

pub fn rank(candidates: &mut [Candidate<'_>]) {
    candidates.sort_by(compare_candidates);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
