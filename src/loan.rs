use crate::discount::{apply_discounts, discount_impact, DiscountEvent};
use crate::error::Result;
use crate::frequency::Frequency;
use crate::schedule::{compute_schedule, RepaymentSchedule, ScheduleEntry};
use chrono::NaiveDate;
use log::info;
use std::fmt;

/// Inputs of a schedule computation. Values are assumed validated by the caller.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanTerms {
    pub principal: f64,
    /// Annual nominal rate as a fraction (0.3 for 30%).
    pub annual_rate: f64,
    pub frequency: Frequency,
    pub repayments: u32,
    pub establishment_date: NaiveDate,
    pub first_repayment_date: NaiveDate,
    /// Fixed repayment to use instead of deriving one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub repayment_override: Option<f64>,
}

impl LoanTerms {
    pub fn new(
        principal: f64,
        annual_rate: f64,
        frequency: Frequency,
        repayments: u32,
        establishment_date: NaiveDate,
        first_repayment_date: NaiveDate,
    ) -> Self {
        Self {
            principal,
            annual_rate,
            frequency,
            repayments,
            establishment_date,
            first_repayment_date,
            repayment_override: None,
        }
    }

    pub fn with_repayment(mut self, amount: f64) -> Self {
        self.repayment_override = Some(amount);
        self
    }
}

/// A loan's initial schedule together with its current, possibly discounted, one.
#[derive(Clone, PartialEq, Debug)]
pub struct Loan {
    terms: LoanTerms,
    initial_rate: f64,
    annual_rate: f64,
    initial_schedule: RepaymentSchedule,
    schedule: RepaymentSchedule,
}

impl Loan {
    pub fn new(terms: LoanTerms) -> Result<Self> {
        let schedule = compute_schedule(&terms)?;
        info!(
            "{} {} repayments of ${:.2}",
            schedule.len(),
            terms.frequency,
            schedule.repayment_amount()
        );

        Ok(Self {
            initial_rate: terms.annual_rate,
            annual_rate: terms.annual_rate,
            initial_schedule: schedule.clone(),
            schedule,
            terms,
        })
    }

    /// Terms the loan was set up with; discounts do not change them.
    pub fn terms(&self) -> &LoanTerms {
        &self.terms
    }

    pub fn initial_rate(&self) -> f64 {
        self.initial_rate
    }

    /// Rate after every discount applied so far.
    pub fn annual_rate(&self) -> f64 {
        self.annual_rate
    }

    /// Repayment quoted when the loan was set up.
    pub fn get_repayment_amount(&self) -> f64 {
        self.initial_schedule.repayment_amount()
    }

    pub fn get_repayment_count(&self) -> usize {
        self.schedule.len()
    }

    pub fn initial_schedule(&self) -> &RepaymentSchedule {
        &self.initial_schedule
    }

    pub fn schedule(&self) -> &RepaymentSchedule {
        &self.schedule
    }

    pub fn get_entry_detail(&self, id: usize) -> Option<&ScheduleEntry> {
        self.schedule.get(id)
    }

    pub fn get_entry_info(&self, id: usize) -> String {
        match self.schedule.get(id) {
            Some(entry) => entry.to_string(),
            None => "No repayment information.".to_string(),
        }
    }

    pub fn repayment_total(&self) -> f64 {
        self.schedule.total_repayment()
    }

    pub fn interest_total(&self) -> f64 {
        self.schedule.total_interest()
    }

    pub fn initial_repayment_total(&self) -> f64 {
        self.initial_schedule.total_repayment()
    }

    pub fn initial_interest_total(&self) -> f64 {
        self.initial_schedule.total_interest()
    }

    /// Applies `discounts` on top of the current schedule and returns the
    /// saving against the initial schedule.
    ///
    /// On error the loan is left unchanged.
    pub fn apply_discounts(&mut self, discounts: &[DiscountEvent]) -> Result<f64> {
        let (schedule, rate) = apply_discounts(&self.schedule, self.annual_rate, discounts)?;
        self.schedule = schedule;
        self.annual_rate = rate;

        let impact = discount_impact(&self.initial_schedule, &self.schedule);
        info!("discounts save ${:.2}, rate now {}", impact, self.annual_rate);
        Ok(impact)
    }

    pub fn show_schedule(&self) {
        for entry in self.schedule.entries() {
            println!("{}", entry);
        }
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Your repayment amount is: ${:.2}", self.get_repayment_amount())?;
        writeln!(
            f,
            "At the end of your loan you'll have paid ${:.2}",
            self.repayment_total()
        )?;
        write!(f, "From that amount ${:.2} is interest.", self.interest_total())
    }
}
