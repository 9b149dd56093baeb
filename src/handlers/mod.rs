pub mod error;
pub mod valuation;
