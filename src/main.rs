use chrono::NaiveDate;
use discount_runner::{DiscountEvent, Frequency, Loan, LoanTerms};
use log::{error, info};
use simple_logger::SimpleLogger;
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
    {
        eprintln!("logger setup failed: {}", e);
    }

    let (Some(establishment), Some(first_repayment)) = (
        NaiveDate::from_ymd_opt(2024, 1, 1),
        NaiveDate::from_ymd_opt(2024, 2, 1),
    ) else {
        error!("invalid demo dates");
        return ExitCode::FAILURE;
    };

    let terms = LoanTerms::new(
        10000.,
        0.3,
        Frequency::Monthly,
        12,
        establishment,
        first_repayment,
    );

    let mut loan = match Loan::new(terms) {
        Ok(loan) => loan,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    println!("{}", loan);
    loan.show_schedule();

    let discounts = [DiscountEvent::new(2, 0.005), DiscountEvent::new(6, 0.05)];
    match loan.apply_discounts(&discounts) {
        Ok(impact) => {
            info!("rate after discounts {:.4}", loan.annual_rate());
            println!(
                "You will save a total amount of ${:.2} with interest discounts.",
                impact
            );
            loan.show_schedule();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// verifies that types can implement the gated traits below
#[cfg(test)]
fn is_normal<T: Sized + Send + Sync + Unpin>() {}

#[test]
fn normal_types() {
    is_normal::<discount_runner::ScheduleEntry>();
    is_normal::<discount_runner::RepaymentSchedule>();
    is_normal::<Loan>();
}
