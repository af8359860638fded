use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoanError {
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    /// The annuity formula or the recalibration weighting would divide by zero.
    #[error("Degenerate rate condition in {context}")]
    DegenerateRate { context: String },

    #[error("Invalid repayment count: {0}")]
    InvalidRepaymentCount(u32),

    #[error("Discount month {month} is outside a schedule of {len} entries")]
    InvalidDiscountMonth { month: usize, len: usize },

    #[error("{0} cannot be advanced by {1} periods")]
    DateOutOfRange(NaiveDate, u32),
}

pub type Result<T> = std::result::Result<T, LoanError>;
