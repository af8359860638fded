use crate::error::{LoanError, Result};
use crate::loan::LoanTerms;
use crate::schedule::{compute_schedule, round, RepaymentSchedule};
use log::debug;

/// A reduction of the annual rate taking effect after the given month.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscountEvent {
    /// 1-based position of the last entry kept at the old rate.
    pub month: usize,
    /// Fraction subtracted from the annual rate, e.g. 0.005 for half a point.
    pub discount: f64,
}

impl DiscountEvent {
    pub fn new(month: usize, discount: f64) -> Self {
        Self { month, discount }
    }
}

/// Re-amortizes `schedule` once per discount, in the order given.
///
/// Entries up to each discount's month are kept; the remaining balance is
/// re-amortized over the remaining repayments at the reduced rate, starting
/// from the reference entry's date. Reductions accumulate, so the returned
/// rate is `annual_rate` minus the sum of every discount.
pub fn apply_discounts(
    schedule: &RepaymentSchedule,
    annual_rate: f64,
    discounts: &[DiscountEvent],
) -> Result<(RepaymentSchedule, f64)> {
    let mut current = schedule.clone();
    let mut current_rate = annual_rate;

    for event in discounts {
        let len = current.len();
        if event.month == 0 || event.month >= len {
            return Err(LoanError::InvalidDiscountMonth {
                month: event.month,
                len,
            });
        }

        let reference = &current.entries()[event.month - 1];
        let next = &current.entries()[event.month];
        current_rate -= event.discount;

        let terms = LoanTerms::new(
            reference.closing_balance,
            current_rate,
            current.frequency(),
            (len - reference.id) as u32,
            reference.date,
            next.date,
        );
        let suffix = compute_schedule(&terms)?;
        debug!(
            "discount of {} after month {}: {} repayments of {} at {}",
            event.discount,
            event.month,
            suffix.len(),
            suffix.repayment_amount(),
            current_rate
        );

        let prefix = current
            .entries()
            .iter()
            .filter(|entry| entry.id <= event.month)
            .cloned()
            .collect::<Vec<_>>();
        current = RepaymentSchedule::spliced(
            current.frequency(),
            suffix.repayment_amount(),
            prefix,
            suffix.entries().iter().cloned(),
        );
    }

    Ok((current, current_rate))
}

/// Total repaid under `original` less the total repaid under `updated`, in cents.
pub fn discount_impact(original: &RepaymentSchedule, updated: &RepaymentSchedule) -> f64 {
    round(original.total_repayment() - updated.total_repayment())
}
