use thiserror::Error;

#[derive(Debug, Error)]
pub enum FundingError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    /// A broken invariant somewhere in the call chain. Never recovered
    /// from silently; the current operation is aborted.
    #[error("Contract violation: loan {loan_id}, facility {facility_id} — {invariant}")]
    ContractViolation {
        loan_id: String,
        facility_id: String,
        invariant: String,
    },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FundingError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FundingError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn violation(
        loan_id: impl ToString,
        facility_id: impl ToString,
        invariant: impl Into<String>,
    ) -> Self {
        FundingError::ContractViolation {
            loan_id: loan_id.to_string(),
            facility_id: facility_id.to_string(),
            invariant: invariant.into(),
        }
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, FundingError::ContractViolation { .. })
    }
}

impl From<serde_json::Error> for FundingError {
    fn from(e: serde_json::Error) -> Self {
        FundingError::SerializationError(e.to_string())
    }
}
