use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::FundingError;
use crate::types::{BankId, FacilityId, LoanId, Money};
use crate::FundingResult;

use super::facility::{Bank, Facility, FacilityScreen};
use super::ledger::{AssignmentRecord, DeclineReason, FundingLedger, Outcome};
use super::loan::Loan;
use super::ranking::{rank, Candidate, DemandStats, DemandTracker, TieBreakWeights};

/// Eligible facilities for one loan, best first.
struct Ranking<'a> {
    ranked: Vec<&'a Facility>,
    /// Whether any facility's covenants accepted the loan, capacity aside.
    any_accepting: bool,
}

/// Streaming loan-to-facility assignment.
///
/// `assign_loan` holds the sequencing mutex for the whole
/// screen/rank/commit/record cycle, so capacity is consumed strictly in
/// arrival order no matter how many threads submit loans. Status and
/// capacity queries take read locks only and never wait on the sequencer.
#[derive(Debug)]
pub struct AssignmentEngine {
    banks: BTreeMap<BankId, Arc<Bank>>,
    facilities: BTreeMap<FacilityId, Facility>,
    weights: TieBreakWeights,
    ledger: FundingLedger,
    demand: Mutex<DemandTracker>,
    /// Next arrival sequence number. Held for the duration of an assignment.
    sequencer: Mutex<u64>,
}

impl AssignmentEngine {
    pub fn new(facilities: Vec<Facility>, weights: TieBreakWeights) -> FundingResult<Self> {
        weights.validate()?;

        let mut banks: BTreeMap<BankId, Arc<Bank>> = BTreeMap::new();
        let mut by_id: BTreeMap<FacilityId, Facility> = BTreeMap::new();

        for facility in facilities {
            let bank = &facility.bank;
            match banks.get(&bank.id) {
                Some(existing) if !Arc::ptr_eq(existing, bank) => {
                    return Err(FundingError::invalid(
                        format!("facility[{}].bank", facility.id),
                        format!("bank id {} is bound to two different banks", bank.id),
                    ));
                }
                Some(_) => {}
                None => {
                    banks.insert(bank.id.clone(), Arc::clone(bank));
                }
            }
            if !bank.facility_ids().is_empty() && !bank.facility_ids().contains(&facility.id) {
                return Err(FundingError::invalid(
                    format!("facility[{}].bank", facility.id),
                    format!("bank {} does not list this facility", bank.id),
                ));
            }
            if by_id.contains_key(&facility.id) {
                return Err(FundingError::invalid(
                    format!("facility[{}]", facility.id),
                    "duplicate facility id",
                ));
            }
            by_id.insert(facility.id.clone(), facility);
        }

        let ledger = FundingLedger::with_facilities(
            by_id
                .values()
                .map(|f| f.remaining_capacity().map(|c| (f.id.clone(), c)))
                .collect::<FundingResult<Vec<_>>>()?,
        );

        Ok(AssignmentEngine {
            banks,
            facilities: by_id,
            weights,
            ledger,
            demand: Mutex::new(DemandTracker::new()),
            sequencer: Mutex::new(0),
        })
    }

    pub fn weights(&self) -> &TieBreakWeights {
        &self.weights
    }

    pub fn ledger(&self) -> &FundingLedger {
        &self.ledger
    }

    /// Facilities in id order.
    pub fn facilities(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.values()
    }

    pub fn facility(&self, id: &FacilityId) -> Option<&Facility> {
        self.facilities.get(id)
    }

    pub fn banks(&self) -> impl Iterator<Item = &Arc<Bank>> {
        self.banks.values()
    }

    /// Assign one loan and record the outcome.
    ///
    /// A decline is a normal `Ok` result. Presenting a loan id that already
    /// has a ledger record is a contract violation.
    pub fn assign_loan(&self, loan: Loan) -> FundingResult<AssignmentRecord> {
        loan.validate()?;
        let mut next_sequence = self.lock_sequencer()?;

        if self.ledger.contains(&loan.id)? {
            return Err(FundingError::violation(
                &loan.id,
                "-",
                "loan identifier presented twice",
            ));
        }

        let ranking = self.rank_for(&loan)?;
        self.settle(loan, ranking, &mut next_sequence)
    }

    /// Screen every facility, feed the demand statistics, and order the
    /// eligible ones best first.
    fn rank_for(&self, loan: &Loan) -> FundingResult<Ranking<'_>> {
        let mut accepting: Vec<FacilityId> = Vec::new();
        let mut eligible: Vec<(&Facility, Money)> = Vec::new();
        for facility in self.facilities.values() {
            if !facility.covenants_satisfied_by(loan) {
                continue;
            }
            accepting.push(facility.id.clone());
            let remaining = facility.remaining_capacity()?;
            if remaining >= loan.amount {
                eligible.push((facility, remaining));
            }
        }

        let mut candidates: Vec<Candidate<'_>> = {
            let mut demand = self.lock_demand()?;
            demand.observe(&accepting);
            eligible
                .iter()
                .map(|&(facility, remaining)| {
                    Candidate::new(
                        facility,
                        remaining,
                        loan.amount,
                        demand.scarcity(&facility.id),
                        &self.weights,
                    )
                })
                .collect()
        };
        rank(&mut candidates);

        Ok(Ranking {
            ranked: candidates.into_iter().map(|c| c.facility).collect(),
            any_accepting: !accepting.is_empty(),
        })
    }

    /// Commit to the first ranked facility that still passes re-validation
    /// under its exclusive lock, then record the outcome.
    fn settle(
        &self,
        loan: Loan,
        ranking: Ranking<'_>,
        next_sequence: &mut u64,
    ) -> FundingResult<AssignmentRecord> {
        let mut committed = None;
        let mut passed_over: Vec<FacilityId> = Vec::new();
        for facility in ranking.ranked {
            match facility.try_commit(&loan)? {
                Some(after) => {
                    committed = Some((facility, after));
                    break;
                }
                None => passed_over.push(facility.id.clone()),
            }
        }

        let (outcome, capacity_after) = match committed {
            Some((facility, after)) => (
                Outcome::Assigned {
                    facility_id: facility.id.clone(),
                    bank_id: facility.bank.id.clone(),
                    rate: facility.interest_rate,
                    amount: loan.amount,
                    expected_yield: facility.expected_yield(&loan),
                },
                Some(after),
            ),
            None => {
                let reason = if ranking.any_accepting {
                    DeclineReason::InsufficientCapacity
                } else {
                    DeclineReason::CovenantsUnmet
                };
                (Outcome::Declined { reason }, None)
            }
        };

        let record = AssignmentRecord {
            sequence: *next_sequence,
            loan_id: loan.id,
            outcome,
            passed_over,
        };
        self.ledger.record(record.clone(), capacity_after)?;
        *next_sequence += 1;
        Ok(record)
    }

    /// Assign loans in iteration order, stopping at the first error.
    pub fn assign_all<I>(&self, loans: I) -> FundingResult<Vec<AssignmentRecord>>
    where
        I: IntoIterator<Item = Loan>,
    {
        loans.into_iter().map(|l| self.assign_loan(l)).collect()
    }

    pub fn loan_status(&self, loan_id: &LoanId) -> FundingResult<Option<AssignmentRecord>> {
        self.ledger.status_of(loan_id)
    }

    /// Remaining capacity as held under the facility's own lock, so draws
    /// made directly through `Facility::commit` are visible too.
    pub fn facility_capacity(&self, facility_id: &FacilityId) -> FundingResult<Option<Money>> {
        self.facilities
            .get(facility_id)
            .map(Facility::remaining_capacity)
            .transpose()
    }

    /// Explain, per facility, whether the loan could be funded right now.
    /// Read-only: neither capacity nor demand statistics change.
    pub fn screen_loan(&self, loan: &Loan) -> FundingResult<Vec<FacilityScreen>> {
        self.facilities.values().map(|f| f.screen(loan)).collect()
    }

    pub fn demand_stats(&self, facility_id: &FacilityId) -> FundingResult<Option<DemandStats>> {
        Ok(self.lock_demand()?.stats(facility_id).cloned())
    }

    fn lock_sequencer(&self) -> FundingResult<MutexGuard<'_, u64>> {
        self.sequencer
            .lock()
            .map_err(|_| FundingError::LockPoisoned("assignment sequencer".into()))
    }

    fn lock_demand(&self) -> FundingResult<MutexGuard<'_, DemandTracker>> {
        self.demand
            .lock()
            .map_err(|_| FundingError::LockPoisoned("demand tracker".into()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
