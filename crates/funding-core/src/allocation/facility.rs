use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::FundingError;
use crate::types::{BankId, FacilityId, Money, Rate};
use crate::FundingResult;

use super::covenant::Covenant;
use super::loan::Loan;

// ---------------------------------------------------------------------------
// Bank
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Bank {
    pub id: BankId,
    pub name: Option<String>,
    facility_ids: Vec<FacilityId>,
    covenants: Vec<Box<dyn Covenant>>,
}

impl Bank {
    pub fn new(id: impl Into<BankId>) -> Self {
        Bank {
            id: id.into(),
            name: None,
            facility_ids: Vec::new(),
            covenants: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a covenant that binds every facility of this bank.
    pub fn with_covenant(mut self, covenant: Box<dyn Covenant>) -> Self {
        self.covenants.push(covenant);
        self
    }

    pub fn with_facility(mut self, facility_id: impl Into<FacilityId>) -> Self {
        let id = facility_id.into();
        if !self.facility_ids.contains(&id) {
            self.facility_ids.push(id);
            self.facility_ids.sort();
        }
        self
    }

    pub fn facility_ids(&self) -> &[FacilityId] {
        &self.facility_ids
    }

    pub fn covenants(&self) -> &[Box<dyn Covenant>] {
        &self.covenants
    }
}

// ---------------------------------------------------------------------------
// Facility
// ---------------------------------------------------------------------------

/// A bank's credit line. Remaining capacity sits behind its own `RwLock`;
/// `commit` takes the write side and re-checks eligibility before drawing.
#[derive(Debug)]
pub struct Facility {
    pub id: FacilityId,
    pub bank: Arc<Bank>,
    pub interest_rate: Rate,
    pub initial_capacity: Money,
    remaining: RwLock<Money>,
    covenants: Vec<Box<dyn Covenant>>,
}

/// Why a facility can or cannot take a given loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityScreen {
    pub facility_id: FacilityId,
    pub bank_id: BankId,
    pub interest_rate: Rate,
    pub remaining_capacity: Money,
    /// Descriptions of every facility- or bank-level covenant the loan fails.
    pub failed_covenants: Vec<String>,
    pub covenants_passed: bool,
    pub capacity_sufficient: bool,
    pub eligible: bool,
}

impl Facility {
    pub fn new(
        id: impl Into<FacilityId>,
        bank: Arc<Bank>,
        interest_rate: Rate,
        capacity: Money,
    ) -> FundingResult<Self> {
        let id = id.into();
        if capacity.is_sign_negative() {
            return Err(FundingError::invalid(
                format!("facility[{id}].capacity"),
                format!("must not be negative, got {capacity}"),
            ));
        }
        if interest_rate.is_sign_negative() {
            return Err(FundingError::invalid(
                format!("facility[{id}].interest_rate"),
                format!("must not be negative, got {interest_rate}"),
            ));
        }
        Ok(Facility {
            id,
            bank,
            interest_rate,
            initial_capacity: capacity,
            remaining: RwLock::new(capacity),
            covenants: Vec::new(),
        })
    }

    pub fn with_covenant(mut self, covenant: Box<dyn Covenant>) -> Self {
        self.covenants.push(covenant);
        self
    }

    pub fn covenants(&self) -> &[Box<dyn Covenant>] {
        &self.covenants
    }

    pub fn remaining_capacity(&self) -> FundingResult<Money> {
        Ok(*self.read_remaining()?)
    }

    /// Own covenants first, then the bank's.
    fn applicable_covenants(&self) -> impl Iterator<Item = &Box<dyn Covenant>> {
        self.covenants.iter().chain(self.bank.covenants().iter())
    }

    /// True iff the loan satisfies every facility and bank covenant.
    /// Capacity is not considered.
    pub fn covenants_satisfied_by(&self, loan: &Loan) -> bool {
        self.applicable_covenants().all(|c| c.is_satisfied_by(loan))
    }

    pub fn eligible_for(&self, loan: &Loan) -> FundingResult<bool> {
        let remaining = *self.read_remaining()?;
        Ok(remaining >= loan.amount && self.covenants_satisfied_by(loan))
    }

    pub fn screen(&self, loan: &Loan) -> FundingResult<FacilityScreen> {
        let remaining = *self.read_remaining()?;
        let failed_covenants: Vec<String> = self
            .applicable_covenants()
            .filter(|c| !c.is_satisfied_by(loan))
            .map(|c| c.describe())
            .collect();
        let covenants_passed = failed_covenants.is_empty();
        let capacity_sufficient = remaining >= loan.amount;
        Ok(FacilityScreen {
            facility_id: self.id.clone(),
            bank_id: self.bank.id.clone(),
            interest_rate: self.interest_rate,
            remaining_capacity: remaining,
            failed_covenants,
            covenants_passed,
            capacity_sufficient,
            eligible: covenants_passed && capacity_sufficient,
        })
    }

    /// Draw the loan amount down from this facility.
    ///
    /// Re-checks covenants and capacity under the exclusive lock. A failing
    /// check is a caller bug and is reported as a contract violation; the
    /// balance is never clamped.
    pub fn commit(&self, loan: &Loan) -> FundingResult<Money> {
        let mut remaining = self.write_remaining()?;
        if !self.covenants_satisfied_by(loan) {
            return Err(FundingError::violation(
                &loan.id,
                &self.id,
                "commit to a facility whose covenants reject the loan",
            ));
        }
        Self::draw(&mut remaining, loan, &self.id)
    }

    /// Exclusive-lock re-validation used by the engine after ranking.
    ///
    /// Returns `Ok(None)` when the facility is no longer eligible, so the
    /// caller can fall back to its next candidate.
    pub(crate) fn try_commit(&self, loan: &Loan) -> FundingResult<Option<Money>> {
        let mut remaining = self.write_remaining()?;
        if *remaining < loan.amount || !self.covenants_satisfied_by(loan) {
            return Ok(None);
        }
        Self::draw(&mut remaining, loan, &self.id).map(Some)
    }

    fn draw(remaining: &mut Money, loan: &Loan, facility_id: &FacilityId) -> FundingResult<Money> {
        let after = *remaining - loan.amount;
        if after < Decimal::ZERO {
            return Err(FundingError::violation(
                &loan.id,
                facility_id,
                format!(
                    "remaining capacity {} cannot cover amount {}",
                    remaining, loan.amount
                ),
            ));
        }
        *remaining = after;
        Ok(after)
    }

    /// Lender's expected yield on the loan if it were funded here:
    /// `(1 - p) * r_loan * A - p * A - r_facility * A`.
    pub fn expected_yield(&self, loan: &Loan) -> Option<Money> {
        let p = loan.default_likelihood?;
        let loan_rate = loan.interest_rate?;
        let amount = loan.amount;
        Some((Decimal::ONE - p) * loan_rate * amount - p * amount - self.interest_rate * amount)
    }

    fn read_remaining(&self) -> FundingResult<RwLockReadGuard<'_, Money>> {
        self.remaining
            .read()
            .map_err(|_| FundingError::LockPoisoned(format!("facility {} capacity", self.id)))
    }

    fn write_remaining(&self) -> FundingResult<RwLockWriteGuard<'_, Money>> {
        self.remaining
            .write()
            .map_err(|_| FundingError::LockPoisoned(format!("facility {} capacity", self.id)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
