use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;

use crate::decimal::Rate;
use crate::errors::{BillingError, Result};

/// calendar months an installment has been late as of `reference`
///
/// a started month counts as a whole one, so any lateness is at least 1 month.
/// returns 0 when `reference` is on or before `due`.
pub fn months_late(due: NaiveDate, reference: NaiveDate) -> u32 {
    if reference <= due {
        return 0;
    }

    let span = (reference.year() - due.year()) * 12 + reference.month() as i32
        - due.month() as i32;
    let mut full = span.max(0) as u32;
    while full > 0 && add_months(due, full).map_or(true, |d| d > reference) {
        full -= 1;
    }

    match add_months(due, full) {
        Some(anniversary) if anniversary == reference => full.max(1),
        _ => full + 1,
    }
}

fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// `(1 + rate)^periods`, compounded once per period
pub fn compound_factor(rate: Rate, periods: u32) -> Result<Decimal> {
    let base = rate.growth_factor();
    let mut factor = Decimal::ONE;
    for _ in 0..periods {
        factor = factor
            .checked_mul(base)
            .ok_or_else(|| BillingError::Calculation {
                message: format!("compounding {rate} over {periods} months overflows"),
            })?;
    }
    Ok(factor)
}
