//! Amortization schedules for fixed-term loans, and the effect of rate
//! discounts applied part way through the term.

pub mod discount;
pub mod error;
pub mod frequency;
pub mod loan;
pub mod schedule;

pub use discount::{apply_discounts, discount_impact, DiscountEvent};
pub use error::{LoanError, Result};
pub use frequency::{payment_date, periodic_rate, Frequency};
pub use loan::{Loan, LoanTerms};
pub use schedule::{compute_schedule, pmt, RepaymentSchedule, ScheduleEntry, Timing};
