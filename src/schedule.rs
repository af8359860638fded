use crate::error::{LoanError, Result};
use crate::frequency::{payment_date, periodic_rate, Frequency};
use crate::loan::LoanTerms;
use chrono::NaiveDate;
use log::{debug, trace};
use std::fmt;

/// When a repayment falls within its period.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Timing {
    /// Paid at the end of the period.
    Ordinary,
    /// Paid at the start of the period.
    Due,
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleEntry {
    pub id: usize,
    pub date: NaiveDate,
    pub opening_balance: f64,
    pub repayment: f64,
    pub interest: f64,
    pub principal: f64,
    pub closing_balance: f64,
}

impl ScheduleEntry {
    pub fn new(
        id: usize,
        date: NaiveDate,
        opening_balance: f64,
        repayment: f64,
        interest: f64,
        principal: f64,
        closing_balance: f64,
    ) -> Self {
        Self {
            id,
            date,
            opening_balance,
            repayment,
            interest,
            principal,
            closing_balance,
        }
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repayment {}, date {}, opening balance ${:.2}, repayment ${:.2}, interest ${:.2}, principal ${:.2}, closing balance ${:.2}",
            self.id,
            self.date.format("%d/%m/%Y"),
            self.opening_balance,
            self.repayment,
            self.interest,
            self.principal,
            self.closing_balance
        )
    }
}

/// A periodic repayment amount and the entries that amortize the loan with it.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepaymentSchedule {
    frequency: Frequency,
    repayment_amount: f64,
    entries: Vec<ScheduleEntry>,
}

impl RepaymentSchedule {
    /// Joins two runs of entries, assigning ids by position starting at 1.
    pub(crate) fn spliced(
        frequency: Frequency,
        repayment_amount: f64,
        prefix: impl IntoIterator<Item = ScheduleEntry>,
        suffix: impl IntoIterator<Item = ScheduleEntry>,
    ) -> Self {
        let entries = prefix
            .into_iter()
            .chain(suffix)
            .enumerate()
            .map(|(i, entry)| ScheduleEntry { id: i + 1, ..entry })
            .collect();

        Self {
            frequency,
            repayment_amount,
            entries,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn repayment_amount(&self) -> f64 {
        self.repayment_amount
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by 1-based id.
    pub fn get(&self, id: usize) -> Option<&ScheduleEntry> {
        id.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn total_repayment(&self) -> f64 {
        self.entries.iter().map(|e| e.repayment).sum()
    }

    pub fn total_interest(&self) -> f64 {
        self.entries.iter().map(|e| e.interest).sum()
    }
}

pub(crate) fn round(amt: f64) -> f64 {
    let rounded = (amt * 100.).round() / 100.;
    // folds -0.0 into 0.0
    if rounded == 0. {
        0.
    } else {
        rounded
    }
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Fixed repayment that amortizes `present_value` over `periods` at `rate` per period,
/// rounded to cents.
pub fn pmt(rate: f64, periods: u32, present_value: f64, timing: Timing) -> Result<f64> {
    let denominator = 1. - (1. + rate).powf(-f64::from(periods));
    if rate == 0. || denominator == 0. || !denominator.is_finite() {
        return Err(LoanError::DegenerateRate {
            context: format!("payment formula (rate {}, {} periods)", rate, periods),
        });
    }

    let mut amount = present_value * rate / denominator;
    if timing == Timing::Due {
        amount /= 1. + rate;
    }
    if !amount.is_finite() {
        return Err(LoanError::DegenerateRate {
            context: format!("payment formula (rate {}, {} periods)", rate, periods),
        });
    }

    Ok(round(amount))
}

/// Expands loan terms into a day-count accrued schedule.
///
/// Interest accrued between establishment and the first repayment is
/// capitalized before the repayment is derived. Without an override, monthly
/// schedules get one recalibration pass against their actual day counts; the
/// last entry is always a balloon that closes the balance to zero.
///
/// The returned repayment amount is the one quoted from the annuity formula;
/// recalibration only changes the repayment carried by the entries.
pub fn compute_schedule(terms: &LoanTerms) -> Result<RepaymentSchedule> {
    if terms.repayments == 0 {
        return Err(LoanError::InvalidRepaymentCount(terms.repayments));
    }

    let daily_rate = terms.annual_rate / 365.;
    let accrual_days = days_between(terms.establishment_date, terms.first_repayment_date);
    let present_value = terms.principal + accrual_days as f64 * daily_rate * terms.principal;

    let repayment = match terms.repayment_override {
        Some(amount) => amount,
        None => pmt(
            periodic_rate(terms.annual_rate, terms.frequency),
            terms.repayments,
            present_value,
            Timing::Due,
        )?,
    };

    let provisional = build_entries(terms, daily_rate, repayment)?;

    if terms.repayment_override.is_some() || terms.frequency != Frequency::Monthly {
        return Ok(RepaymentSchedule {
            frequency: terms.frequency,
            repayment_amount: round(repayment),
            entries: provisional,
        });
    }

    let adjusted = recalibrate(
        &provisional,
        terms.first_repayment_date,
        daily_rate,
        terms.repayments,
        present_value,
    )?
    .unwrap_or(repayment);
    debug!("recalibrated repayment {} -> {}", repayment, adjusted);

    Ok(RepaymentSchedule {
        frequency: terms.frequency,
        repayment_amount: round(repayment),
        entries: build_entries(terms, daily_rate, adjusted)?,
    })
}

fn build_entries(terms: &LoanTerms, daily_rate: f64, repayment: f64) -> Result<Vec<ScheduleEntry>> {
    let count = terms.repayments;
    let mut entries = Vec::with_capacity(count as usize);
    let mut prior_balance = terms.principal.abs();
    let mut prior_date = terms.establishment_date;

    for i in 0..count {
        let date = payment_date(terms.first_repayment_date, i, terms.frequency)?;
        let interest = days_between(prior_date, date) as f64 * daily_rate * prior_balance;
        let principal = repayment.abs() - interest;
        let id = i as usize + 1;

        let entry = if i == count - 1 {
            let balloon = prior_balance + interest;
            let balloon_principal = balloon - interest;
            ScheduleEntry::new(
                id,
                date,
                prior_balance,
                round(balloon),
                round(interest),
                round(balloon_principal),
                round(prior_balance - balloon_principal),
            )
        } else {
            ScheduleEntry::new(
                id,
                date,
                prior_balance,
                repayment.abs(),
                round(interest),
                round(principal),
                round(prior_balance - principal),
            )
        };
        trace!("{}", entry);
        entries.push(entry);

        prior_balance = round(prior_balance - principal);
        prior_date = date;
    }

    Ok(entries)
}

/// Re-derives the repayment from the interest-weighted average period length of a
/// provisional schedule. The first entry is not weighted. Returns `None` when
/// there is no later entry to weight.
fn recalibrate(
    provisional: &[ScheduleEntry],
    first_repayment_date: NaiveDate,
    daily_rate: f64,
    repayments: u32,
    present_value: f64,
) -> Result<Option<f64>> {
    if provisional.len() < 2 {
        return Ok(None);
    }

    let mut last_date = first_repayment_date;
    let mut weighted_days = 0.;
    let mut interest_sum = 0.;
    for entry in &provisional[1..] {
        weighted_days += days_between(last_date, entry.date) as f64 * entry.interest;
        interest_sum += entry.interest;
        last_date = entry.date;
    }

    if interest_sum == 0. {
        return Err(LoanError::DegenerateRate {
            context: "repayment recalibration (no interest accrued)".to_string(),
        });
    }

    let days_per_period = weighted_days / interest_sum;
    trace!("interest-weighted period length {} days", days_per_period);

    pmt(daily_rate * days_per_period, repayments, present_value, Timing::Due).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{compute_schedule, pmt, round, Timing};
    use crate::error::LoanError;
    use crate::frequency::{periodic_rate, Frequency};
    use crate::loan::LoanTerms;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use test_log::test;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_terms() -> LoanTerms {
        LoanTerms::new(
            10000.,
            0.3,
            Frequency::Monthly,
            12,
            date(2024, 1, 1),
            date(2024, 2, 1),
        )
    }

    #[test]
    fn test_round() {
        assert_eq!(round(975.333), 975.33);
        assert_eq!(round(0.125), 0.13);
        assert_eq!(round(-0.001), 0.);
        assert!(round(-0.001).is_sign_positive());
    }

    #[test]
    fn test_pmt() {
        assert_eq!(pmt(0.025, 12, 10000., Timing::Ordinary), Ok(974.87));
        assert_eq!(pmt(0.025, 12, 10000., Timing::Due), Ok(951.09));
        assert_eq!(
            pmt(0.3 / 12., 12, 10254.794520547945, Timing::Due),
            Ok(975.33)
        );
    }

    #[test]
    fn test_pmt_zero_rate() {
        assert!(matches!(
            pmt(0., 12, 10000., Timing::Due),
            Err(LoanError::DegenerateRate { .. })
        ));
    }

    #[test]
    fn test_monthly_schedule() {
        let schedule = compute_schedule(&monthly_terms()).unwrap();

        assert_eq!(schedule.repayment_amount(), 975.33);
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule.frequency(), Frequency::Monthly);

        let first = schedule.get(1).unwrap();
        assert_eq!(first.date, date(2024, 2, 1));
        assert_eq!(first.opening_balance, 10000.);
        assert_eq!(first.repayment, 975.1);
        assert_eq!(first.interest, 254.79);
        assert_eq!(first.principal, 720.31);
        assert_eq!(first.closing_balance, 9279.69);

        let second = schedule.get(2).unwrap();
        assert_eq!(second.date, date(2024, 3, 1));
        assert_eq!(second.opening_balance, 9279.69);
        assert_eq!(second.interest, 221.19);
        assert_eq!(second.closing_balance, 8525.78);

        let last = schedule.get(12).unwrap();
        assert_eq!(last.date, date(2025, 1, 1));
        assert_eq!(last.opening_balance, 948.78);
        assert_eq!(last.repayment, 972.95);
        assert_eq!(last.interest, 24.17);
        assert_eq!(last.principal, 948.78);
        assert_eq!(last.closing_balance, 0.);

        assert!(schedule.get(0).is_none());
        assert!(schedule.get(13).is_none());
        assert_abs_diff_eq!(schedule.total_repayment(), 11699.05, epsilon = 1e-6);
        assert_abs_diff_eq!(schedule.total_interest(), 1699.05, epsilon = 1e-6);
    }

    #[test]
    fn test_recalibration_only_changes_entries() {
        let schedule = compute_schedule(&monthly_terms()).unwrap();

        // quoted from the annuity formula, entries carry the recalibrated amount
        assert_eq!(schedule.repayment_amount(), 975.33);
        assert_eq!(schedule.get(1).unwrap().repayment, 975.1);
        assert!(schedule.entries()[..11]
            .iter()
            .all(|entry| entry.repayment == 975.1));
    }

    #[test]
    fn test_dates_past_calendar_end() {
        let terms = LoanTerms::new(
            10000.,
            0.3,
            Frequency::Weekly,
            2,
            NaiveDate::MAX,
            NaiveDate::MAX,
        );

        assert_eq!(
            compute_schedule(&terms),
            Err(LoanError::DateOutOfRange(NaiveDate::MAX, 1))
        );
    }

    #[test]
    fn test_entry_invariants() {
        let schedule = compute_schedule(&monthly_terms()).unwrap();
        let entries = schedule.entries();

        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.id, i + 1);
            assert_eq!(
                entry.closing_balance,
                round(entry.opening_balance - entry.principal)
            );
        }
        for entry in &entries[..entries.len() - 1] {
            assert_abs_diff_eq!(entry.repayment, entry.interest + entry.principal, epsilon = 0.01);
        }
        for pair in entries.windows(2) {
            assert_eq!(pair[1].opening_balance, pair[0].closing_balance);
        }
    }

    #[test]
    fn test_fortnightly_schedule_is_not_recalibrated() {
        let terms = LoanTerms::new(
            25000.,
            0.42,
            Frequency::Fortnightly,
            26,
            date(2024, 3, 10),
            date(2024, 3, 24),
        );
        let present_value = 25000. + 14. * (0.42 / 365.) * 25000.;
        let first_pass = pmt(
            periodic_rate(0.42, Frequency::Fortnightly),
            26,
            present_value,
            Timing::Due,
        )
        .unwrap();

        let schedule = compute_schedule(&terms).unwrap();
        assert_eq!(schedule.repayment_amount(), first_pass);
        assert_eq!(schedule.repayment_amount(), 1184.54);
        assert_eq!(schedule.len(), 26);

        let second = schedule.get(2).unwrap();
        assert_eq!(second.date, date(2024, 4, 7));
        assert_eq!(second.interest, 390.15);
        assert_eq!(second.closing_balance, 23423.81);

        let last = schedule.get(26).unwrap();
        assert_eq!(last.date, date(2025, 3, 9));
        assert_eq!(last.repayment, 1184.48);
        assert_eq!(last.closing_balance, 0.);
    }

    #[test]
    fn test_weekly_schedule_without_accrual_gap() {
        let terms = LoanTerms::new(
            5000.,
            0.25,
            Frequency::Weekly,
            52,
            date(2024, 1, 1),
            date(2024, 1, 1),
        );
        let first_pass = pmt(periodic_rate(0.25, Frequency::Weekly), 52, 5000., Timing::Due);

        let schedule = compute_schedule(&terms).unwrap();
        assert_eq!(Ok(schedule.repayment_amount()), first_pass);
        assert_eq!(schedule.repayment_amount(), 108.35);

        // first repayment falls on the establishment date
        let first = schedule.get(1).unwrap();
        assert_eq!(first.interest, 0.);
        assert_eq!(first.principal, 108.35);
        assert_eq!(first.closing_balance, 4891.65);

        let last = schedule.get(52).unwrap();
        assert_eq!(last.date, date(2024, 12, 23));
        assert_eq!(last.repayment, 108.18);
        assert_eq!(last.closing_balance, 0.);
    }

    #[test]
    fn test_repayment_override() {
        let terms = monthly_terms().with_repayment(1000.);
        let schedule = compute_schedule(&terms).unwrap();

        assert_eq!(schedule.repayment_amount(), 1000.);
        let first = schedule.get(1).unwrap();
        assert_eq!(first.repayment, 1000.);
        assert_eq!(first.principal, 745.21);
        assert_eq!(first.closing_balance, 9254.79);

        let last = schedule.get(12).unwrap();
        assert_eq!(last.opening_balance, 637.82);
        assert_eq!(last.repayment, 654.07);
        assert_eq!(last.closing_balance, 0.);
    }

    #[test]
    fn test_negative_principal() {
        let mut terms = monthly_terms();
        terms.principal = -10000.;

        let negative = compute_schedule(&terms).unwrap();
        let positive = compute_schedule(&monthly_terms()).unwrap();

        assert_eq!(negative.repayment_amount(), -975.33);
        assert_eq!(negative.entries(), positive.entries());
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(
            compute_schedule(&monthly_terms()),
            compute_schedule(&monthly_terms())
        );
    }

    #[test]
    fn test_single_repayment() {
        let mut terms = monthly_terms();
        terms.repayments = 1;

        let schedule = compute_schedule(&terms).unwrap();
        assert_eq!(schedule.len(), 1);

        let only = schedule.get(1).unwrap();
        assert_eq!(only.interest, 254.79);
        assert_eq!(only.repayment, 10254.79);
        assert_eq!(only.closing_balance, 0.);
    }

    #[test]
    fn test_degenerate_inputs() {
        let mut terms = monthly_terms();
        terms.repayments = 0;
        assert_eq!(
            compute_schedule(&terms),
            Err(LoanError::InvalidRepaymentCount(0))
        );

        let mut terms = monthly_terms();
        terms.annual_rate = 0.;
        assert!(matches!(
            compute_schedule(&terms),
            Err(LoanError::DegenerateRate { .. })
        ));

        // a zero balance accrues no interest to weight periods by
        let mut terms = monthly_terms();
        terms.principal = 0.;
        assert!(matches!(
            compute_schedule(&terms),
            Err(LoanError::DegenerateRate { .. })
        ));
    }

    #[test]
    fn test_entry_display() {
        let schedule = compute_schedule(&monthly_terms()).unwrap();
        assert_eq!(
            schedule.get(1).unwrap().to_string(),
            "repayment 1, date 01/02/2024, opening balance $10000.00, repayment $975.10, interest $254.79, principal $720.31, closing balance $9279.69"
        );
        assert_eq!(
            schedule.get(12).unwrap().to_string(),
            "repayment 12, date 01/01/2025, opening balance $948.78, repayment $972.95, interest $24.17, principal $948.78, closing balance $0.00"
        );
    }
}
