use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::interest::OverdueCalculator;
use crate::state::{OverdueTerms, Payment};
use crate::types::PaymentStatus;

/// body of `PUT /payment/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCorrection {
    pub original_value: Option<Money>,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub observation: Option<String>,
}

impl PaymentCorrection {
    pub fn is_empty(&self) -> bool {
        self.original_value.is_none()
            && self.due_date.is_none()
            && self.payment_date.is_none()
            && self.observation.is_none()
    }
}

/// result of a mark-as-paid request
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// the installment moved to PAID or PAID_LATE
    Settled(Payment),
    /// the installment was already settled; nothing changed
    AlreadySettled(Payment),
}

impl Settlement {
    pub fn payment(&self) -> &Payment {
        match self {
            Settlement::Settled(p) | Settlement::AlreadySettled(p) => p,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            Settlement::Settled(p) | Settlement::AlreadySettled(p) => p,
        }
    }
}

/// installment lifecycle
///
/// ```text
/// PENDING --(today > due)--> OVERDUE        derived on read, never stored
/// PENDING --mark paid, date <= due--> PAID
/// OVERDUE --mark paid, date >  due--> PAID_LATE  (overdue value frozen)
/// ```
///
/// PAID and PAID_LATE are terminal.
#[derive(Debug, Clone, Copy)]
pub struct PaymentStatusResolver {
    calculator: OverdueCalculator,
}

impl PaymentStatusResolver {
    pub fn new(terms: OverdueTerms) -> Self {
        Self {
            calculator: OverdueCalculator::new(terms),
        }
    }

    /// current view of a stored installment as of `today`
    ///
    /// open installments get their status and overdue value derived from the due
    /// date alone; settled ones are returned untouched.
    pub fn resolve(&self, stored: &Payment, today: NaiveDate) -> Result<Payment> {
        let mut payment = stored.clone();
        if payment.payment_status.is_terminal() {
            return Ok(payment);
        }

        payment.payment_date = None;
        match self.calculator.overdue_value(&payment, today)? {
            Some(value) => {
                payment.payment_status = PaymentStatus::Overdue;
                payment.overdue_value = Some(value);
            }
            None => {
                payment.payment_status = PaymentStatus::Pending;
                payment.overdue_value = None;
            }
        }
        Ok(payment)
    }

    /// settle an installment paid on `payment_date`
    pub fn mark_paid(&self, stored: &Payment, payment_date: NaiveDate) -> Result<Settlement> {
        if stored.payment_status.is_terminal() {
            return Ok(Settlement::AlreadySettled(stored.clone()));
        }
        Ok(Settlement::Settled(self.paid_on(stored, payment_date)?))
    }

    /// write the corrected fields verbatim and re-derive the status from them
    pub fn apply_correction(
        &self,
        stored: &Payment,
        correction: &PaymentCorrection,
        today: NaiveDate,
    ) -> Result<Payment> {
        let mut payment = stored.clone();

        if let Some(value) = correction.original_value {
            if !value.is_positive() {
                return Err(BillingError::InvalidAmount { amount: value });
            }
            payment.original_value = value;
        }
        if let Some(due_date) = correction.due_date {
            payment.due_date = due_date;
        }
        if let Some(observation) = &correction.observation {
            let trimmed = observation.trim();
            payment.observation = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }

        let payment_date = correction.payment_date.or(payment.payment_date);
        match payment_date {
            Some(date) => self.paid_on(&payment, date),
            None => {
                payment.payment_status = PaymentStatus::Pending;
                self.resolve(&payment, today)
            }
        }
    }

    fn paid_on(&self, stored: &Payment, payment_date: NaiveDate) -> Result<Payment> {
        let mut payment = stored.clone();
        payment.payment_date = Some(payment_date);

        match self.calculator.overdue_value(&payment, payment_date)? {
            Some(value) => {
                payment.payment_status = PaymentStatus::PaidLate;
                payment.overdue_value = Some(value);
            }
            None => {
                payment.payment_status = PaymentStatus::Paid;
                payment.overdue_value = None;
            }
        }
        Ok(payment)
    }
}
