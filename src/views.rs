use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::boleto::{BankType, Boleto, BoletoId, BoletoStatus};
use crate::client::Client;
use crate::decimal::{Money, Rate};
use crate::grouping::PaymentGrouping;
use crate::state::{Payment, PaymentGroup};
use crate::types::{ClientId, PaymentGroupId, PaymentId, PaymentStatus};

/// client as returned to request handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub id: ClientId,
    pub name: String,
    pub document: String,
    pub phone: Option<String>,
    pub address: String,
    pub bank: Option<String>,
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
}

impl From<&Client> for ClientView {
    fn from(client: &Client) -> Self {
        ClientView {
            id: client.id,
            name: client.name.clone(),
            document: client.document.to_string(),
            phone: client.phone.clone(),
            address: client.address.clone(),
            bank: client.bank.clone(),
            late_fee_rate: client.late_fee_rate,
            monthly_interest_rate: client.monthly_interest_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: PaymentId,
    pub client_id: ClientId,
    pub payment_group_id: PaymentGroupId,
    pub group_name: String,
    pub payer_name: String,
    pub payer_phone: Option<String>,
    pub installment_number: u32,
    pub total_installments: u32,
    pub original_value: Money,
    pub overdue_value: Option<Money>,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub observation: Option<String>,
}

impl PaymentView {
    pub fn new(payment: &Payment, group: &PaymentGroup) -> Self {
        PaymentView {
            id: payment.id,
            client_id: payment.client_id,
            payment_group_id: payment.payment_group_id,
            group_name: group.group_name.clone(),
            payer_name: payment.payer_name.clone(),
            payer_phone: group.payer_phone.clone(),
            installment_number: payment.installment_number,
            total_installments: payment.total_installments,
            original_value: payment.original_value,
            overdue_value: payment.overdue_value,
            due_date: payment.due_date,
            payment_date: payment.payment_date,
            payment_status: payment.payment_status,
            observation: payment.observation.clone(),
        }
    }
}

/// one group's entry in the monthly listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedPaymentView {
    pub main_payment: PaymentView,
    pub overdue_payments: Vec<PaymentView>,
}

impl GroupedPaymentView {
    pub fn new(grouping: &PaymentGrouping, group: &PaymentGroup) -> Self {
        GroupedPaymentView {
            main_payment: PaymentView::new(&grouping.main_payment, group),
            overdue_payments: grouping
                .overdue_payments
                .iter()
                .map(|p| PaymentView::new(p, group))
                .collect(),
        }
    }

    /// total owed across the main installment and its open arrears
    pub fn total_outstanding(&self) -> Money {
        std::iter::once(&self.main_payment)
            .chain(self.overdue_payments.iter())
            .filter(|p| p.payment_status.is_open())
            .map(|p| p.overdue_value.unwrap_or(p.original_value))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentGroupView {
    pub id: PaymentGroupId,
    pub client_id: ClientId,
    pub group_name: String,
    pub payer_name: String,
    pub payer_document: String,
    pub payer_phone: Option<String>,
    pub monthly_value: Money,
    pub total_installments: u32,
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
    pub first_installment_due_date: NaiveDate,
    pub creation_date: NaiveDate,
    pub observation: Option<String>,
    pub installments: Vec<PaymentView>,
}

impl PaymentGroupView {
    pub fn new(group: &PaymentGroup, installments: &[Payment]) -> Self {
        PaymentGroupView {
            id: group.id,
            client_id: group.client_id,
            group_name: group.group_name.clone(),
            payer_name: group.payer_name.clone(),
            payer_document: group.payer_document.to_string(),
            payer_phone: group.payer_phone.clone(),
            monthly_value: group.monthly_value,
            total_installments: group.total_installments,
            late_fee_rate: group.late_fee_rate,
            monthly_interest_rate: group.monthly_interest_rate,
            first_installment_due_date: group.first_installment_due_date,
            creation_date: group.creation_date,
            observation: group.observation.clone(),
            installments: installments
                .iter()
                .map(|p| PaymentView::new(p, group))
                .collect(),
        }
    }
}

/// boleto as returned to request handlers; the raw bank response stays internal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoletoView {
    pub id: BoletoId,
    pub payment_id: PaymentId,
    pub bank_type: BankType,
    pub bank_boleto_id: Option<String>,
    pub barcode: Option<String>,
    pub digitable_line: Option<String>,
    pub pdf_url: Option<String>,
    pub status: BoletoStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Boleto> for BoletoView {
    fn from(boleto: &Boleto) -> Self {
        BoletoView {
            id: boleto.id,
            payment_id: boleto.payment_id,
            bank_type: boleto.bank_type,
            bank_boleto_id: boleto.bank_boleto_id.clone(),
            barcode: boleto.barcode.clone(),
            digitable_line: boleto.digitable_line.clone(),
            pdf_url: boleto.pdf_url.clone(),
            status: boleto.status,
            error_message: boleto.error_message.clone(),
            created_at: boleto.created_at,
        }
    }
}

/// pretty-printed json of any view
pub fn to_json_pretty<T: Serialize>(view: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;
    use serde_json::Value;
    use uuid::Uuid;

    fn group() -> PaymentGroup {
        PaymentGroup {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            group_name: "52998224725-1".to_string(),
            payer_name: "Fabio".to_string(),
            payer_document: Document::parse("52998224725").unwrap(),
            payer_phone: Some("11988887777".to_string()),
            monthly_value: Money::from_major(100),
            total_installments: 2,
            late_fee_rate: Rate::from_percentage(2),
            monthly_interest_rate: Rate::from_percentage(1),
            first_installment_due_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            creation_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            observation: None,
        }
    }

    fn payment(group: &PaymentGroup, number: u32, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            payment_group_id: group.id,
            client_id: group.client_id,
            payer_name: group.payer_name.clone(),
            installment_number: number,
            total_installments: 2,
            original_value: Money::from_major(100),
            due_date: NaiveDate::from_ymd_opt(2024, number, 10).unwrap(),
            payment_date: None,
            payment_status: status,
            overdue_value: status.carries_overdue_value().then(|| Money::from_minor(10302)),
            observation: None,
        }
    }

    #[test]
    fn test_payment_view_json_shape() {
        let group = group();
        let view = PaymentView::new(&payment(&group, 1, PaymentStatus::Overdue), &group);
        let json: Value = serde_json::to_value(&view).unwrap();

        assert_eq!(json["groupName"], "52998224725-1");
        assert_eq!(json["payerPhone"], "11988887777");
        assert_eq!(json["paymentStatus"], "OVERDUE");
        assert_eq!(json["dueDate"], "2024-01-10");
        assert_eq!(json["originalValue"].as_f64(), Some(100.0));
        assert_eq!(json["overdueValue"].as_f64(), Some(103.02));
        assert!(json["paymentDate"].is_null());
    }

    #[test]
    fn test_grouped_view_totals_open_rows() {
        let group = group();
        let grouping = PaymentGrouping {
            main_payment: payment(&group, 2, PaymentStatus::Pending),
            overdue_payments: vec![payment(&group, 1, PaymentStatus::Overdue)],
        };

        let view = GroupedPaymentView::new(&grouping, &group);
        assert_eq!(view.total_outstanding(), Money::from_minor(20302));

        let json = to_json_pretty(&view).unwrap();
        assert!(json.contains("\"mainPayment\""));
        assert!(json.contains("\"overduePayments\""));
    }

    #[test]
    fn test_group_view_lists_installments() {
        let group = group();
        let rows = vec![
            payment(&group, 1, PaymentStatus::Pending),
            payment(&group, 2, PaymentStatus::Pending),
        ];
        let view = PaymentGroupView::new(&group, &rows);

        assert_eq!(view.installments.len(), 2);
        assert_eq!(view.payer_document, "52998224725");
        assert_eq!(view.late_fee_rate, Rate::from_percentage(2));
    }

    #[test]
    fn test_boleto_view_json_shape() {
        let boleto = Boleto::from_response(
            Uuid::new_v4(),
            BankType::Inter,
            crate::boleto::BankApiResponse::failed("bank offline"),
            chrono::Utc::now(),
        );
        let json: Value = serde_json::to_value(BoletoView::from(&boleto)).unwrap();

        assert_eq!(json["bankType"], "INTER");
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["errorMessage"], "bank offline");
        assert!(json.get("bankApiResponse").is_none());
    }
}
