pub mod error;
pub mod types;

#[cfg(feature = "allocation")]
pub mod allocation;

pub use error::FundingError;
pub use types::*;

/// Standard result type for all funding operations
pub type FundingResult<T> = Result<T, FundingError>;
