use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{ClientId, Document, PaymentGroupId, PaymentId, PaymentStatus};

/// a payer's installment plan; immutable after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentGroup {
    pub id: PaymentGroupId,
    pub client_id: ClientId,
    pub group_name: String,
    pub payer_name: String,
    pub payer_document: Document,
    pub payer_phone: Option<String>,
    pub monthly_value: Money,
    pub total_installments: u32,
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
    pub first_installment_due_date: NaiveDate,
    pub creation_date: NaiveDate,
    pub observation: Option<String>,
}

impl PaymentGroup {
    pub fn overdue_terms(&self) -> OverdueTerms {
        OverdueTerms {
            late_fee_rate: self.late_fee_rate,
            monthly_interest_rate: self.monthly_interest_rate,
        }
    }
}

/// rates an installment inherits from its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueTerms {
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
}

/// one scheduled installment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub payment_group_id: PaymentGroupId,
    pub client_id: ClientId,
    pub payer_name: String,
    pub installment_number: u32,
    pub total_installments: u32,
    pub original_value: Money,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub overdue_value: Option<Money>,
    pub observation: Option<String>,
}

impl Payment {
    /// status and optional fields agree with each other
    pub fn is_consistent(&self) -> bool {
        let overdue_ok =
            self.overdue_value.is_some() == self.payment_status.carries_overdue_value();
        let paid_ok = self.payment_date.is_some() == self.payment_status.is_terminal();
        let value_ok = self
            .overdue_value
            .map_or(true, |v| v >= self.original_value);
        overdue_ok && paid_ok && value_ok
    }

    /// amount owed right now: the overdue value when one applies
    pub fn amount_due(&self) -> Money {
        self.overdue_value.unwrap_or(self.original_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pending() -> Payment {
        Payment {
            id: Uuid::new_v4(),
            payment_group_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            payer_name: "Ana".to_string(),
            installment_number: 1,
            total_installments: 1,
            original_value: Money::from_major(100),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            payment_date: None,
            payment_status: PaymentStatus::Pending,
            overdue_value: None,
            observation: None,
        }
    }

    #[test]
    fn test_consistency_rules() {
        let mut p = pending();
        assert!(p.is_consistent());
        assert_eq!(p.amount_due(), Money::from_major(100));

        p.payment_status = PaymentStatus::Overdue;
        assert!(!p.is_consistent());

        p.overdue_value = Some(Money::from_minor(10302));
        assert!(p.is_consistent());
        assert_eq!(p.amount_due(), Money::from_minor(10302));

        p.payment_status = PaymentStatus::Paid;
        assert!(!p.is_consistent());
    }
}
