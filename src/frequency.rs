use crate::error::{LoanError, Result};
use chrono::{Days, Months, NaiveDate};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Frequency {
    Monthly,
    Fortnightly,
    Weekly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Monthly => "monthly",
            Frequency::Fortnightly => "fortnightly",
            Frequency::Weekly => "weekly",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Frequency {
    type Err = LoanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "fortnightly" => Ok(Frequency::Fortnightly),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(LoanError::InvalidFrequency(s.to_string())),
        }
    }
}

/// Converts an annual nominal rate (0.3 for 30%) to the rate charged per repayment period.
pub fn periodic_rate(annual_rate: f64, frequency: Frequency) -> f64 {
    match frequency {
        Frequency::Monthly => annual_rate / 12.,
        Frequency::Fortnightly => annual_rate / 365. * 14.,
        Frequency::Weekly => annual_rate / 365. * 7.,
    }
}

/// Date of the repayment `offset` periods after `anchor` (offset 0 is the anchor itself).
///
/// Monthly offsets keep the anchor's day of month, clamped to the last day of
/// shorter months.
pub fn payment_date(anchor: NaiveDate, offset: u32, frequency: Frequency) -> Result<NaiveDate> {
    let date = match frequency {
        Frequency::Monthly => anchor.checked_add_months(Months::new(offset)),
        Frequency::Fortnightly => anchor.checked_add_days(Days::new(u64::from(offset) * 14)),
        Frequency::Weekly => anchor.checked_add_days(Days::new(u64::from(offset) * 7)),
    };

    date.ok_or(LoanError::DateOutOfRange(anchor, offset))
}
