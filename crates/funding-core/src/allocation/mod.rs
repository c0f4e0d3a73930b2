pub mod book;
pub mod covenant;
pub mod engine;
pub mod facility;
pub mod ledger;
pub mod loan;
pub mod ranking;

pub use book::{
    build_engine, run_allocation, screen_loan, AllocationInput, AllocationOutput, BankSpec,
    CovenantSpec, FacilitySpec, FacilitySummary, ScreenOutput,
};
pub use covenant::{Covenant, CovenantRule};
pub use engine::AssignmentEngine;
pub use facility::{Bank, Facility, FacilityScreen};
pub use ledger::{AssignmentRecord, DeclineReason, FundingLedger, Outcome};
pub use loan::Loan;
pub use ranking::TieBreakWeights;
