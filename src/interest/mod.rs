pub mod compound;
pub mod penalty;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{BillingError, Result};
use crate::state::{OverdueTerms, Payment};

pub use compound::{compound_factor, months_late};
pub use penalty::LateFee;

/// breakdown of an overdue amount
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueCalculation {
    pub original_value: Money,
    pub overdue_value: Money,
    pub months_late: u32,
    pub late_fee_factor: Decimal,
    pub interest_factor: Decimal,
    pub reference_date: NaiveDate,
}

impl OverdueCalculation {
    /// late fee plus interest on top of the original value
    pub fn surcharge(&self) -> Money {
        self.overdue_value - self.original_value
    }
}

/// computes what an unpaid installment costs as of a reference date
///
/// the late fee is charged once; interest compounds monthly on top of it:
/// `original × (1 + fee) × (1 + interest)^months_late`, rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverdueCalculator {
    pub late_fee: LateFee,
    pub monthly_interest_rate: Rate,
}

impl OverdueCalculator {
    pub fn new(terms: OverdueTerms) -> Self {
        Self {
            late_fee: LateFee::new(terms.late_fee_rate),
            monthly_interest_rate: terms.monthly_interest_rate,
        }
    }

    /// `None` when the reference date is on or before the due date
    pub fn calculate(
        &self,
        original_value: Money,
        due_date: NaiveDate,
        reference_date: NaiveDate,
    ) -> Result<Option<OverdueCalculation>> {
        let months = months_late(due_date, reference_date);
        if months == 0 {
            return Ok(None);
        }

        let late_fee_factor = self.late_fee.factor();
        let interest_factor = compound_factor(self.monthly_interest_rate, months)?;
        let factor = late_fee_factor
            .checked_mul(interest_factor)
            .ok_or_else(|| BillingError::Calculation {
                message: format!("overdue factor for {months} months overflows"),
            })?;
        let overdue_value = original_value.scale_by(factor)?;

        Ok(Some(OverdueCalculation {
            original_value,
            overdue_value,
            months_late: months,
            late_fee_factor,
            interest_factor,
            reference_date,
        }))
    }

    /// overdue value of an installment as of `reference_date`
    pub fn overdue_value(&self, payment: &Payment, reference_date: NaiveDate) -> Result<Option<Money>> {
        Ok(self
            .calculate(payment.original_value, payment.due_date, reference_date)?
            .map(|c| c.overdue_value))
    }
}
