use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{BillingError, Result};
use crate::state::{Payment, PaymentGroup};
use crate::types::{Document, PaymentId};

/// unique identifier for a boleto
pub type BoletoId = Uuid;

/// banks a boleto can be issued through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankType {
    #[default]
    Inter,
    Itau,
    Bradesco,
    BancoDoBrasil,
}

impl BankType {
    /// febraban bank code
    pub fn code(&self) -> &'static str {
        match self {
            BankType::Inter => "077",
            BankType::Itau => "341",
            BankType::Bradesco => "237",
            BankType::BancoDoBrasil => "001",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BankType::Inter => "INTER",
            BankType::Itau => "ITAU",
            BankType::Bradesco => "BRADESCO",
            BankType::BancoDoBrasil => "BANCO_DO_BRASIL",
        }
    }
}

impl fmt::Display for BankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoletoStatus {
    Generated,
    /// the bank rejected the request; generation may be retried
    Error,
    Paid,
    Cancelled,
}

impl BoletoStatus {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BoletoStatus::Error)
    }
}

impl fmt::Display for BoletoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoletoStatus::Generated => "GENERATED",
            BoletoStatus::Error => "ERROR",
            BoletoStatus::Paid => "PAID",
            BoletoStatus::Cancelled => "CANCELLED",
        })
    }
}

/// what a bank needs to register a boleto for one installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoletoRequest {
    pub payment_id: PaymentId,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub issue_date: NaiveDate,
    pub payer_name: String,
    pub payer_document: Document,
    pub payer_phone: Option<String>,
    pub description: String,
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
}

impl BoletoRequest {
    /// build a request for an installment, rejecting ones a bank would refuse
    pub fn for_payment(payment: &Payment, group: &PaymentGroup, issue_date: NaiveDate) -> Result<Self> {
        if !payment.original_value.is_positive() {
            return Err(BillingError::Validation {
                message: format!("boleto amount must be positive, got {}", payment.original_value),
            });
        }
        let payer_name = payment.payer_name.trim();
        if payer_name.is_empty() {
            return Err(BillingError::Validation {
                message: "boleto payer name must not be blank".to_string(),
            });
        }

        Ok(BoletoRequest {
            payment_id: payment.id,
            amount: payment.original_value,
            due_date: payment.due_date,
            issue_date,
            payer_name: payer_name.to_string(),
            payer_document: group.payer_document.clone(),
            payer_phone: group.payer_phone.clone(),
            description: group.group_name.clone(),
            late_fee_rate: group.late_fee_rate,
            monthly_interest_rate: group.monthly_interest_rate,
        })
    }
}

/// a bank's answer to a registration request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankApiResponse {
    pub success: bool,
    pub bank_boleto_id: Option<String>,
    pub barcode: Option<String>,
    pub digitable_line: Option<String>,
    pub pdf_url: Option<String>,
    pub raw_response: Option<String>,
    pub error_message: Option<String>,
}

impl BankApiResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// integration with one bank's boleto api
///
/// bank-side failures come back as an unsuccessful response, not an error, so
/// they can be recorded and retried.
pub trait BankBoletoStrategy: Send + Sync {
    fn supported_bank(&self) -> BankType;
    fn generate_boleto(&self, request: &BoletoRequest) -> BankApiResponse;
}

/// strategies by bank
#[derive(Default)]
pub struct BankStrategies {
    strategies: HashMap<BankType, Box<dyn BankBoletoStrategy>>,
}

impl BankStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    /// registry with the mock strategy standing in for inter
    pub fn with_mock() -> Self {
        Self::new().register(MockBoletoStrategy::new(BankType::Inter))
    }

    /// register a strategy, replacing any earlier one for the same bank
    pub fn register(mut self, strategy: impl BankBoletoStrategy + 'static) -> Self {
        self.strategies.insert(strategy.supported_bank(), Box::new(strategy));
        self
    }

    pub fn get(&self, bank: BankType) -> Result<&dyn BankBoletoStrategy> {
        self.strategies
            .get(&bank)
            .map(|s| s.as_ref())
            .ok_or_else(|| BillingError::Validation {
                message: format!("bank not supported: {bank}"),
            })
    }

    pub fn supported_banks(&self) -> Vec<BankType> {
        self.strategies.keys().copied().collect()
    }
}

/// a stored boleto; at most one per installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boleto {
    pub id: BoletoId,
    pub payment_id: PaymentId,
    pub bank_type: BankType,
    pub bank_boleto_id: Option<String>,
    pub barcode: Option<String>,
    pub digitable_line: Option<String>,
    pub pdf_url: Option<String>,
    pub status: BoletoStatus,
    pub bank_api_response: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Boleto {
    /// record a bank response; unsuccessful responses are stored as ERROR
    pub fn from_response(
        payment_id: PaymentId,
        bank_type: BankType,
        response: BankApiResponse,
        created_at: DateTime<Utc>,
    ) -> Self {
        Boleto {
            id: Uuid::new_v4(),
            payment_id,
            bank_type,
            status: if response.success {
                BoletoStatus::Generated
            } else {
                BoletoStatus::Error
            },
            bank_boleto_id: response.bank_boleto_id,
            barcode: response.barcode,
            digitable_line: response.digitable_line,
            pdf_url: response.pdf_url,
            bank_api_response: response.raw_response,
            error_message: response.error_message,
            created_at,
            updated_at: None,
        }
    }
}

// largest amount the 10-digit value field of a barcode can carry, in cents
const MAX_BARCODE_CENTS: u64 = 9_999_999_999;

/// offline strategy producing well-formed but fictitious boletos
#[derive(Debug, Clone, Copy)]
pub struct MockBoletoStrategy {
    bank: BankType,
}

impl MockBoletoStrategy {
    pub fn new(bank: BankType) -> Self {
        Self { bank }
    }
}

impl BankBoletoStrategy for MockBoletoStrategy {
    fn supported_bank(&self) -> BankType {
        self.bank
    }

    fn generate_boleto(&self, request: &BoletoRequest) -> BankApiResponse {
        warn!(payment_id = %request.payment_id, bank = %self.bank, "mock bank in use");

        let cents = request
            .amount
            .as_decimal()
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_u64());
        let cents = match cents {
            Some(cents) if cents <= MAX_BARCODE_CENTS => cents,
            _ => {
                return BankApiResponse::failed(format!(
                    "amount {} exceeds the barcode value field",
                    request.amount
                ))
            }
        };

        let our_number = format!(
            "MOCK-{}-{}",
            request.due_date.format("%Y%m%d"),
            &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
        );
        let barcode = barcode(self.bank, request, cents);
        let digitable_line = digitable_line(&barcode);
        let pdf_url = format!("https://mock-bank.test/api/boleto/pdf/{our_number}");

        let raw_response = serde_json::json!({
            "nossoNumero": our_number,
            "codigoBarras": barcode,
            "linhaDigitavel": digitable_line,
            "pdfBoleto": pdf_url,
            "dataEmissao": request.issue_date,
            "dataVencimento": request.due_date,
            "valorNominal": request.amount,
            "pagador": {
                "cpfCnpj": request.payer_document,
                "nome": request.payer_name,
                "telefone": request.payer_phone.clone().unwrap_or_default(),
            },
            "mock": true,
        })
        .to_string();

        info!(our_number = %our_number, "mock boleto generated");
        BankApiResponse {
            success: true,
            bank_boleto_id: Some(our_number),
            barcode: Some(barcode),
            digitable_line: Some(digitable_line),
            pdf_url: Some(pdf_url),
            raw_response: Some(raw_response),
            error_message: None,
        }
    }
}

/// days from the 1997-10-07 base date, modulo 10000
pub fn due_date_factor(due_date: NaiveDate) -> u32 {
    let days = NaiveDate::from_ymd_opt(1997, 10, 7)
        .map(|base| (due_date - base).num_days())
        .unwrap_or_default();
    days.rem_euclid(10_000) as u32
}

/// modulo 11 check digit, weights 2..=9 from the right; 0, 10 and 11 map to 1
pub fn mod11_digit(digits: &str) -> u32 {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip((2..=9).cycle())
        .map(|(d, w)| d * w)
        .sum();
    match 11 - sum % 11 {
        0 | 10 | 11 => 1,
        dv => dv,
    }
}

// bank(3) currency(1) dv(1) factor(4) value(10) free field(25)
fn barcode(bank: BankType, request: &BoletoRequest, cents: u64) -> String {
    let factor = format!("{:04}", due_date_factor(request.due_date));
    let value = format!("{cents:010}");
    let free_field = format!("{:025}", request.payment_id.as_u128() % 10u128.pow(25));

    let without_dv = format!("{}9{factor}{value}{free_field}", bank.code());
    let dv = mod11_digit(&without_dv);
    format!("{}9{dv}{factor}{value}{free_field}", bank.code())
}

/// the 47-digit typed line derived from a 44-digit barcode
pub fn digitable_line(barcode: &str) -> String {
    let barcode = format!("{barcode:0<44}");
    let (bank_currency, dv, factor_value, free) =
        (&barcode[0..4], &barcode[4..5], &barcode[5..19], &barcode[19..44]);

    let field1 = format!("{bank_currency}{}", &free[0..5]);
    let field2 = &free[5..15];
    let field3 = &free[15..25];

    format!(
        "{}.{}{} {}.{}{} {}.{}{} {dv} {factor_value}",
        &field1[0..5],
        &field1[5..9],
        mod11_digit(&field1),
        &field2[0..5],
        &field2[5..10],
        mod11_digit(field2),
        &field3[0..5],
        &field3[5..10],
        mod11_digit(field3),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn group() -> PaymentGroup {
        PaymentGroup {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            group_name: "52998224725-1".to_string(),
            payer_name: "Helena Dias".to_string(),
            payer_document: Document::parse("52998224725").unwrap(),
            payer_phone: None,
            monthly_value: Money::from_major(100),
            total_installments: 1,
            late_fee_rate: Rate::from_percentage(2),
            monthly_interest_rate: Rate::from_percentage(1),
            first_installment_due_date: date(2024, 1, 10),
            creation_date: date(2024, 1, 1),
            observation: None,
        }
    }

    fn payment(group: &PaymentGroup, value: Money) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            payment_group_id: group.id,
            client_id: group.client_id,
            payer_name: group.payer_name.clone(),
            installment_number: 1,
            total_installments: 1,
            original_value: value,
            due_date: date(2024, 1, 10),
            payment_date: None,
            payment_status: PaymentStatus::Pending,
            overdue_value: None,
            observation: None,
        }
    }

    #[test]
    fn test_request_from_payment() {
        let group = group();
        let request =
            BoletoRequest::for_payment(&payment(&group, Money::from_major(100)), &group, date(2024, 1, 2))
                .unwrap();

        assert_eq!(request.amount, Money::from_major(100));
        assert_eq!(request.description, "52998224725-1");
        assert_eq!(request.payer_document.as_str(), "52998224725");
        assert_eq!(request.late_fee_rate, Rate::from_percentage(2));
    }

    #[test]
    fn test_request_rejects_unbillable_payment() {
        let group = group();
        let mut blank = payment(&group, Money::from_major(100));
        blank.payer_name = "  ".to_string();
        assert!(BoletoRequest::for_payment(&blank, &group, date(2024, 1, 2))
            .unwrap_err()
            .is_validation());

        let zero = payment(&group, Money::ZERO);
        assert!(BoletoRequest::for_payment(&zero, &group, date(2024, 1, 2)).is_err());
    }

    #[test]
    fn test_mock_boleto_layout() {
        let group = group();
        let request =
            BoletoRequest::for_payment(&payment(&group, Money::from_minor(15075)), &group, date(2024, 1, 2))
                .unwrap();

        let response = MockBoletoStrategy::new(BankType::Inter).generate_boleto(&request);
        assert!(response.success);

        let barcode = response.barcode.unwrap();
        assert_eq!(barcode.len(), 44);
        assert!(barcode.starts_with("0779"));
        assert_eq!(&barcode[5..9], "9591");
        assert_eq!(&barcode[9..19], "0000015075");

        let line = response.digitable_line.unwrap();
        assert_eq!(line.chars().filter(|c| c.is_ascii_digit()).count(), 47);
        assert!(line.ends_with("95910000015075"));

        let raw: serde_json::Value = serde_json::from_str(&response.raw_response.unwrap()).unwrap();
        assert_eq!(raw["mock"], true);
        assert_eq!(raw["dataVencimento"], "2024-01-10");
        assert!(response.bank_boleto_id.unwrap().starts_with("MOCK-20240110-"));
    }

    #[test]
    fn test_mock_rejects_amount_beyond_barcode() {
        let group = group();
        let request = BoletoRequest::for_payment(
            &payment(&group, Money::from_major(100_000_000)),
            &group,
            date(2024, 1, 2),
        )
        .unwrap();

        let response = MockBoletoStrategy::new(BankType::Inter).generate_boleto(&request);
        assert!(!response.success);
        assert!(response.error_message.is_some());

        let boleto = Boleto::from_response(request.payment_id, BankType::Inter, response, Utc::now());
        assert_eq!(boleto.status, BoletoStatus::Error);
        assert!(boleto.status.is_retryable());
    }

    #[test]
    fn test_check_digits() {
        // 4*2 + 3*3 + 2*4 + 1*5 = 30; 11 - 30 % 11 = 3
        assert_eq!(mod11_digit("1234"), 3);
        // 0 * anything = 0; 11 - 0 = 11 maps to 1
        assert_eq!(mod11_digit("0000"), 1);
        assert_eq!(due_date_factor(date(1997, 10, 7)), 0);
        assert_eq!(due_date_factor(date(2024, 1, 10)), 9591);
    }

    #[test]
    fn test_strategy_registry() {
        let strategies = BankStrategies::with_mock();
        assert_eq!(strategies.supported_banks(), vec![BankType::Inter]);
        assert!(strategies.get(BankType::Inter).is_ok());
        assert!(matches!(
            strategies.get(BankType::Itau),
            Err(BillingError::Validation { .. })
        ));
        assert_eq!(BankType::Bradesco.code(), "237");
    }
}
