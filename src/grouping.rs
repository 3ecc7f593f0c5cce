use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, Result};
use crate::state::Payment;
use crate::types::{ClientId, PaymentGroupId, PaymentId, PaymentStatus};

/// query of `GET /payment`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    pub client_id: Option<ClientId>,
    pub status: Option<PaymentStatus>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl PaymentFilter {
    pub fn for_month(year: i32, month: u32) -> Self {
        Self {
            month: Some(month),
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// calendar month selected by the filter; missing parts default to `today`'s
    pub fn period(&self, today: NaiveDate) -> Result<BillingPeriod> {
        let year = self.year.unwrap_or_else(|| today.year());
        let month = self.month.unwrap_or_else(|| today.month());
        BillingPeriod::new(year, month)
    }
}

/// an inclusive calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let invalid = || BillingError::InvalidDate {
            message: format!("no such month: {year}-{month:02}"),
        };
        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last_day = next_month.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
        Ok(Self { first_day, last_day })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }
}

/// a group's current installment together with its arrears
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentGrouping {
    pub main_payment: Payment,
    pub overdue_payments: Vec<Payment>,
}

impl PaymentGrouping {
    pub fn payment_group_id(&self) -> PaymentGroupId {
        self.main_payment.payment_group_id
    }
}

/// composes resolved installments into one entry per payment group
///
/// a group is listed when it has an installment due in the filtered month or
/// carries overdue arrears. the main payment is the group's earliest open
/// installment; failing that, the earliest settled one due in the month. every
/// other OVERDUE or PAID_LATE installment of the group is attached as backlog.
/// the status filter only decides whether the main payment is listed.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupingService;

impl GroupingService {
    pub fn new() -> Self {
        Self
    }

    /// `payments` must already be resolved as of `today`
    pub fn group(
        &self,
        payments: &[Payment],
        filter: &PaymentFilter,
        today: NaiveDate,
    ) -> Result<Vec<PaymentGrouping>> {
        let period = filter.period(today)?;

        let mut by_group: BTreeMap<PaymentGroupId, Vec<&Payment>> = BTreeMap::new();
        for payment in payments
            .iter()
            .filter(|p| filter.client_id.map_or(true, |id| p.client_id == id))
        {
            by_group.entry(payment.payment_group_id).or_default().push(payment);
        }

        let mut result: Vec<PaymentGrouping> = by_group
            .into_values()
            .filter_map(|rows| group_entry(&rows, &period))
            .filter(|entry| {
                filter
                    .status
                    .map_or(true, |status| entry.main_payment.payment_status == status)
            })
            .collect();

        result.sort_by(|a, b| {
            a.main_payment
                .due_date
                .cmp(&b.main_payment.due_date)
                .then_with(|| a.payment_group_id().cmp(&b.payment_group_id()))
        });
        Ok(result)
    }
}

fn group_entry(rows: &[&Payment], period: &BillingPeriod) -> Option<PaymentGrouping> {
    let in_period: Vec<&Payment> = rows
        .iter()
        .copied()
        .filter(|p| period.contains(p.due_date))
        .collect();
    let arrears: Vec<&Payment> = rows
        .iter()
        .copied()
        .filter(|p| p.payment_status == PaymentStatus::Overdue)
        .collect();

    let mut seen: HashSet<PaymentId> = HashSet::new();
    let candidates: Vec<&Payment> = in_period
        .iter()
        .chain(arrears.iter())
        .copied()
        .filter(|p| seen.insert(p.id))
        .collect();

    let main = earliest(candidates.iter().copied().filter(|p| p.payment_status.is_open()))
        .or_else(|| earliest(in_period.iter().copied()))?;

    let mut overdue_payments: Vec<Payment> = rows
        .iter()
        .copied()
        .filter(|p| p.id != main.id && p.payment_status.carries_overdue_value())
        .cloned()
        .collect();
    overdue_payments.sort_by_key(|p| (p.due_date, p.installment_number));

    Some(PaymentGrouping {
        main_payment: main.clone(),
        overdue_payments,
    })
}

fn earliest<'a>(payments: impl Iterator<Item = &'a Payment>) -> Option<&'a Payment> {
    payments.min_by_key(|p| (p.due_date, p.installment_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(
        group: PaymentGroupId,
        client: ClientId,
        number: u32,
        due: NaiveDate,
        status: PaymentStatus,
    ) -> Payment {
        let overdue_value = status
            .carries_overdue_value()
            .then(|| Money::from_minor(10302));
        let payment_date = status.is_terminal().then_some(due);
        Payment {
            id: Uuid::new_v4(),
            payment_group_id: group,
            client_id: client,
            payer_name: "Diego".to_string(),
            installment_number: number,
            total_installments: 3,
            original_value: Money::from_major(100),
            due_date: due,
            payment_date,
            payment_status: status,
            overdue_value,
            observation: None,
        }
    }

    #[test]
    fn test_single_overdue_installment() {
        let group = Uuid::new_v4();
        let client = Uuid::new_v4();
        let rows = vec![row(group, client, 1, date(2024, 1, 10), PaymentStatus::Overdue)];

        let today = date(2024, 3, 5);
        let result = GroupingService::new()
            .group(&rows, &PaymentFilter::default(), today)
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].main_payment.payment_status, PaymentStatus::Overdue);
        assert!(result[0].overdue_payments.is_empty());
    }

    #[test]
    fn test_earliest_open_installment_leads() {
        let group = Uuid::new_v4();
        let client = Uuid::new_v4();
        let rows = vec![
            row(group, client, 3, date(2024, 3, 10), PaymentStatus::Pending),
            row(group, client, 1, date(2024, 1, 10), PaymentStatus::Overdue),
            row(group, client, 2, date(2024, 2, 10), PaymentStatus::Overdue),
        ];

        let result = GroupingService::new()
            .group(&rows, &PaymentFilter::for_month(2024, 3), date(2024, 3, 5))
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].main_payment.installment_number, 1);
        let backlog: Vec<u32> = result[0]
            .overdue_payments
            .iter()
            .map(|p| p.installment_number)
            .collect();
        assert_eq!(backlog, vec![2]);
    }

    #[test]
    fn test_settled_month_shows_paid_installment_with_backlog() {
        let group = Uuid::new_v4();
        let client = Uuid::new_v4();
        let rows = vec![
            row(group, client, 1, date(2024, 1, 10), PaymentStatus::PaidLate),
            row(group, client, 2, date(2024, 2, 10), PaymentStatus::Paid),
            row(group, client, 3, date(2024, 3, 10), PaymentStatus::Pending),
        ];

        let result = GroupingService::new()
            .group(&rows, &PaymentFilter::for_month(2024, 2), date(2024, 2, 20))
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].main_payment.installment_number, 2);
        assert_eq!(result[0].overdue_payments.len(), 1);
        assert_eq!(result[0].overdue_payments[0].payment_status, PaymentStatus::PaidLate);
    }

    #[test]
    fn test_status_filter_keeps_backlog() {
        let group = Uuid::new_v4();
        let client = Uuid::new_v4();
        let rows = vec![
            row(group, client, 1, date(2024, 1, 10), PaymentStatus::Overdue),
            row(group, client, 2, date(2024, 2, 10), PaymentStatus::Overdue),
            row(group, client, 3, date(2024, 3, 10), PaymentStatus::Pending),
        ];
        let today = date(2024, 3, 5);

        let overdue_only = GroupingService::new()
            .group(
                &rows,
                &PaymentFilter::for_month(2024, 3).status(PaymentStatus::Overdue),
                today,
            )
            .unwrap();
        assert_eq!(overdue_only.len(), 1);
        assert_eq!(overdue_only[0].overdue_payments.len(), 1);

        let pending_only = GroupingService::new()
            .group(
                &rows,
                &PaymentFilter::for_month(2024, 3).status(PaymentStatus::Pending),
                today,
            )
            .unwrap();
        assert!(pending_only.is_empty());
    }

    #[test]
    fn test_client_filter_and_ordering() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (g1, g2, g3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![
            row(g1, alice, 1, date(2024, 5, 20), PaymentStatus::Pending),
            row(g2, alice, 1, date(2024, 5, 3), PaymentStatus::Pending),
            row(g3, bob, 1, date(2024, 5, 1), PaymentStatus::Pending),
        ];
        let today = date(2024, 4, 30);

        let all = GroupingService::new()
            .group(&rows, &PaymentFilter::for_month(2024, 5), today)
            .unwrap();
        let order: Vec<PaymentGroupId> = all.iter().map(|e| e.payment_group_id()).collect();
        assert_eq!(order, vec![g3, g2, g1]);

        let only_alice = GroupingService::new()
            .group(&rows, &PaymentFilter::for_month(2024, 5).client(alice), today)
            .unwrap();
        assert_eq!(only_alice.len(), 2);
        assert!(only_alice.iter().all(|e| e.main_payment.client_id == alice));
    }

    #[test]
    fn test_groups_without_rows_in_month_are_skipped() {
        let group = Uuid::new_v4();
        let client = Uuid::new_v4();
        let rows = vec![row(group, client, 1, date(2024, 7, 10), PaymentStatus::Pending)];

        let result = GroupingService::new()
            .group(&rows, &PaymentFilter::for_month(2024, 6), date(2024, 6, 1))
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_period_bounds() {
        let feb = BillingPeriod::new(2024, 2).unwrap();
        assert_eq!(feb.last_day, date(2024, 2, 29));
        assert!(feb.contains(date(2024, 2, 1)));
        assert!(!feb.contains(date(2024, 3, 1)));

        let dec = BillingPeriod::new(2023, 12).unwrap();
        assert_eq!(dec.last_day, date(2023, 12, 31));

        assert!(BillingPeriod::new(2024, 13).is_err());
        assert!(PaymentFilter {
            month: Some(0),
            ..PaymentFilter::default()
        }
        .period(date(2024, 1, 1))
        .is_err());
    }
}
