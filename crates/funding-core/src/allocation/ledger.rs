use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::FundingError;
use crate::types::{BankId, FacilityId, LoanId, Money, Rate};
use crate::FundingResult;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    /// No facility's covenants (own plus bank) accept the loan.
    CovenantsUnmet,
    /// Some facility accepts the loan, but none has the capacity left.
    InsufficientCapacity,
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineReason::CovenantsUnmet => write!(f, "no eligible facility: covenants unmet"),
            DeclineReason::InsufficientCapacity => {
                write!(f, "no eligible facility: insufficient capacity")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Assigned {
        facility_id: FacilityId,
        bank_id: BankId,
        /// Facility rate at assignment time.
        rate: Rate,
        amount: Money,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected_yield: Option<Money>,
    },
    Declined {
        reason: DeclineReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// Zero-based arrival position.
    pub sequence: u64,
    pub loan_id: LoanId,
    pub outcome: Outcome,
    /// Ranked facilities that failed re-validation at commit time, in the
    /// order they were tried.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed_over: Vec<FacilityId>,
}

impl AssignmentRecord {
    pub fn assigned_facility(&self) -> Option<&FacilityId> {
        match &self.outcome {
            Outcome::Assigned { facility_id, .. } => Some(facility_id),
            Outcome::Declined { .. } => None,
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self.outcome, Outcome::Declined { .. })
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityPosition {
    pub remaining_capacity: Money,
    pub loans_assigned: u64,
    pub expected_yield: Money,
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<AssignmentRecord>,
    by_loan: HashMap<LoanId, usize>,
    positions: BTreeMap<FacilityId, FacilityPosition>,
}

/// Append-only outcome log with a per-facility position snapshot.
///
/// All state sits behind one `RwLock`, so every read sees the ledger as of
/// some complete write.
#[derive(Debug, Default)]
pub struct FundingLedger {
    state: RwLock<LedgerState>,
}

impl FundingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the capacity snapshot with each facility's opening capacity.
    pub fn with_facilities<I>(facilities: I) -> Self
    where
        I: IntoIterator<Item = (FacilityId, Money)>,
    {
        let positions = facilities
            .into_iter()
            .map(|(id, capacity)| {
                (
                    id,
                    FacilityPosition {
                        remaining_capacity: capacity,
                        ..FacilityPosition::default()
                    },
                )
            })
            .collect();
        FundingLedger {
            state: RwLock::new(LedgerState {
                positions,
                ..LedgerState::default()
            }),
        }
    }

    /// Append a record. `capacity_after` is the winning facility's remaining
    /// capacity once the loan was drawn; ignored for declines.
    pub fn record(
        &self,
        record: AssignmentRecord,
        capacity_after: Option<Money>,
    ) -> FundingResult<()> {
        let mut state = self.write_state()?;
        if state.by_loan.contains_key(&record.loan_id) {
            let facility = record
                .assigned_facility()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string());
            return Err(FundingError::violation(
                &record.loan_id,
                facility,
                "loan already has a ledger record",
            ));
        }

        if let Outcome::Assigned {
            facility_id,
            expected_yield,
            ..
        } = &record.outcome
        {
            let position = state.positions.entry(facility_id.clone()).or_default();
            if let Some(after) = capacity_after {
                position.remaining_capacity = after;
            }
            position.loans_assigned += 1;
            position.expected_yield += expected_yield.unwrap_or(Decimal::ZERO);
        }

        let index = state.records.len();
        state.by_loan.insert(record.loan_id.clone(), index);
        state.records.push(record);
        Ok(())
    }

    pub fn contains(&self, loan_id: &LoanId) -> FundingResult<bool> {
        Ok(self.read_state()?.by_loan.contains_key(loan_id))
    }

    pub fn status_of(&self, loan_id: &LoanId) -> FundingResult<Option<AssignmentRecord>> {
        let state = self.read_state()?;
        Ok(state
            .by_loan
            .get(loan_id)
            .and_then(|&i| state.records.get(i))
            .cloned())
    }

    pub fn capacity_of(&self, facility_id: &FacilityId) -> FundingResult<Option<Money>> {
        Ok(self
            .read_state()?
            .positions
            .get(facility_id)
            .map(|p| p.remaining_capacity))
    }

    pub fn position_of(&self, facility_id: &FacilityId) -> FundingResult<Option<FacilityPosition>> {
        Ok(self.read_state()?.positions.get(facility_id).cloned())
    }

    /// Unrounded sum of expected yield over loans funded by the facility.
    pub fn expected_yield_of(&self, facility_id: &FacilityId) -> FundingResult<Option<Money>> {
        Ok(self
            .read_state()?
            .positions
            .get(facility_id)
            .map(|p| p.expected_yield))
    }

    pub fn loans_assigned_to(&self, facility_id: &FacilityId) -> FundingResult<Vec<LoanId>> {
        Ok(self
            .read_state()?
            .records
            .iter()
            .filter(|r| r.assigned_facility() == Some(facility_id))
            .map(|r| r.loan_id.clone())
            .collect())
    }

    /// Records in arrival order.
    pub fn records(&self) -> FundingResult<Vec<AssignmentRecord>> {
        Ok(self.read_state()?.records.clone())
    }

    pub fn len(&self) -> FundingResult<usize> {
        Ok(self.read_state()?.records.len())
    }

    pub fn is_empty(&self) -> FundingResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn assigned_count(&self) -> FundingResult<usize> {
        Ok(self
            .read_state()?
            .records
            .iter()
            .filter(|r| !r.is_declined())
            .count())
    }

    pub fn declined_count(&self) -> FundingResult<usize> {
        Ok(self
            .read_state()?
            .records
            .iter()
            .filter(|r| r.is_declined())
            .count())
    }

    fn read_state(&self) -> FundingResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| FundingError::LockPoisoned("funding ledger".into()))
    }

    fn write_state(&self) -> FundingResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| FundingError::LockPoisoned("funding ledger".into()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
