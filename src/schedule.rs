use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{validate_rates, Client};
use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{BillingError, Result};
use crate::state::{Payment, PaymentGroup};
use crate::types::{ClientId, Document, PaymentStatus};

/// body of `POST /payment-group`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentGroup {
    pub client_id: ClientId,
    pub payer_name: String,
    pub payer_document: String,
    pub payer_phone: Option<String>,
    pub monthly_value: Money,
    pub total_installments: u32,
    pub late_fee_rate: Option<Rate>,
    pub monthly_interest_rate: Option<Rate>,
    pub first_installment_due_date: NaiveDate,
    pub observation: Option<String>,
}

impl NewPaymentGroup {
    pub fn builder() -> NewPaymentGroupBuilder {
        NewPaymentGroupBuilder::new()
    }
}

/// group row plus its installments, ready to be persisted together
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSchedule {
    pub group: PaymentGroup,
    pub installments: Vec<Payment>,
}

impl GeneratedSchedule {
    pub fn total_value(&self) -> Money {
        self.installments.iter().map(|p| p.original_value).sum()
    }
}

/// expands a payment group request into installment rows
pub struct ScheduleGenerator<'a> {
    config: &'a EngineConfig,
}

impl<'a> ScheduleGenerator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// build the group and all of its installments
    ///
    /// `existing_groups_for_payer` is the number of groups already held by the
    /// payer document and numbers the new group's name.
    pub fn generate(
        &self,
        request: &NewPaymentGroup,
        client: &Client,
        existing_groups_for_payer: usize,
        today: NaiveDate,
    ) -> Result<GeneratedSchedule> {
        if request.client_id != client.id {
            return Err(BillingError::Validation {
                message: format!(
                    "request client {} does not match client {}",
                    request.client_id, client.id
                ),
            });
        }
        if !request.monthly_value.is_positive() {
            return Err(BillingError::InvalidAmount {
                amount: request.monthly_value,
            });
        }
        if request.total_installments < 1 {
            return Err(BillingError::InvalidInstallmentCount {
                count: request.total_installments,
            });
        }

        let payer_name = request.payer_name.trim().to_string();
        if payer_name.is_empty() {
            return Err(BillingError::Validation {
                message: "payer name must not be blank".to_string(),
            });
        }
        if payer_name.chars().count() > self.config.max_name_length {
            return Err(BillingError::Validation {
                message: format!("payer name exceeds {} characters", self.config.max_name_length),
            });
        }
        let observation = self.observation(request.observation.as_deref())?;
        let payer_document = Document::parse(&request.payer_document)?;

        let defaults = client.rates();
        let late_fee_rate = request.late_fee_rate.unwrap_or(defaults.late_fee_rate);
        let monthly_interest_rate = request
            .monthly_interest_rate
            .unwrap_or(defaults.monthly_interest_rate);
        validate_rates(late_fee_rate, monthly_interest_rate)?;

        let group = PaymentGroup {
            id: Uuid::new_v4(),
            client_id: client.id,
            group_name: format!("{}-{}", payer_document, existing_groups_for_payer + 1),
            payer_name: payer_name.clone(),
            payer_document,
            payer_phone: request
                .payer_phone
                .as_ref()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            monthly_value: request.monthly_value,
            total_installments: request.total_installments,
            late_fee_rate,
            monthly_interest_rate,
            first_installment_due_date: request.first_installment_due_date,
            creation_date: today,
            observation: observation.clone(),
        };

        let installments = (1..=request.total_installments)
            .map(|number| -> Result<Payment> {
                Ok(Payment {
                    id: Uuid::new_v4(),
                    payment_group_id: group.id,
                    client_id: client.id,
                    payer_name: payer_name.clone(),
                    installment_number: number,
                    total_installments: request.total_installments,
                    original_value: request.monthly_value,
                    due_date: installment_due_date(request.first_installment_due_date, number)?,
                    payment_date: None,
                    payment_status: PaymentStatus::Pending,
                    overdue_value: None,
                    observation: observation.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GeneratedSchedule { group, installments })
    }

    fn observation(&self, raw: Option<&str>) -> Result<Option<String>> {
        let observation = raw.map(str::trim).filter(|s| !s.is_empty());
        if let Some(text) = observation {
            if text.chars().count() > self.config.max_observation_length {
                return Err(BillingError::Validation {
                    message: format!(
                        "observation exceeds {} characters",
                        self.config.max_observation_length
                    ),
                });
            }
        }
        Ok(observation.map(str::to_string))
    }
}

/// due date of installment `number` (1-based), clamped to the month's last day
pub fn installment_due_date(first_due_date: NaiveDate, number: u32) -> Result<NaiveDate> {
    first_due_date
        .checked_add_months(Months::new(number.saturating_sub(1)))
        .ok_or_else(|| BillingError::InvalidDate {
            message: format!("installment {number} after {first_due_date} is out of range"),
        })
}

/// builder for payment group requests
#[derive(Debug, Default)]
pub struct NewPaymentGroupBuilder {
    client_id: Option<ClientId>,
    payer_name: Option<String>,
    payer_document: Option<String>,
    payer_phone: Option<String>,
    monthly_value: Option<Money>,
    total_installments: Option<u32>,
    late_fee_rate: Option<Rate>,
    monthly_interest_rate: Option<Rate>,
    first_installment_due_date: Option<NaiveDate>,
    observation: Option<String>,
}

impl NewPaymentGroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn payer(mut self, name: &str, document: &str) -> Self {
        self.payer_name = Some(name.to_string());
        self.payer_document = Some(document.to_string());
        self
    }

    pub fn payer_phone(mut self, phone: &str) -> Self {
        self.payer_phone = Some(phone.to_string());
        self
    }

    pub fn monthly_value(mut self, value: Money) -> Self {
        self.monthly_value = Some(value);
        self
    }

    pub fn installments(mut self, count: u32) -> Self {
        self.total_installments = Some(count);
        self
    }

    pub fn late_fee_rate(mut self, rate: Rate) -> Self {
        self.late_fee_rate = Some(rate);
        self
    }

    pub fn monthly_interest_rate(mut self, rate: Rate) -> Self {
        self.monthly_interest_rate = Some(rate);
        self
    }

    pub fn first_due_date(mut self, date: NaiveDate) -> Self {
        self.first_installment_due_date = Some(date);
        self
    }

    pub fn observation(mut self, text: &str) -> Self {
        self.observation = Some(text.to_string());
        self
    }

    pub fn build(self) -> Result<NewPaymentGroup> {
        Ok(NewPaymentGroup {
            client_id: self.client_id.ok_or_else(|| missing("client id"))?,
            payer_name: self.payer_name.ok_or_else(|| missing("payer name"))?,
            payer_document: self.payer_document.ok_or_else(|| missing("payer document"))?,
            payer_phone: self.payer_phone,
            monthly_value: self.monthly_value.ok_or_else(|| missing("monthly value"))?,
            total_installments: self
                .total_installments
                .ok_or_else(|| missing("total installments"))?,
            late_fee_rate: self.late_fee_rate,
            monthly_interest_rate: self.monthly_interest_rate,
            first_installment_due_date: self
                .first_installment_due_date
                .ok_or_else(|| missing("first installment due date"))?,
            observation: self.observation,
        })
    }
}

fn missing(field: &str) -> BillingError {
    BillingError::Validation {
        message: format!("{field} must not be null"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NewClient;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn client() -> Client {
        Client::register(
            NewClient {
                client_name: "acme cobranças".to_string(),
                address: "Av. Paulista, 1000".to_string(),
                document: "12.345.678/0001-95".to_string(),
                late_fee_rate: Some(Rate::from_percentage(2)),
                monthly_interest_rate: Some(Rate::from_percentage(1)),
                ..NewClient::default()
            },
            &EngineConfig::default(),
        )
        .unwrap()
    }

    fn request(client: &Client, value: Money, count: u32, first: NaiveDate) -> NewPaymentGroup {
        NewPaymentGroup::builder()
            .client(client.id)
            .payer("Carlos Lima", "529.982.247-25")
            .monthly_value(value)
            .installments(count)
            .first_due_date(first)
            .build()
            .unwrap()
    }

    #[test]
    fn test_generates_contiguous_installments() {
        let config = EngineConfig::default();
        let client = client();
        let req = request(&client, Money::from_minor(15075), 12, date(2024, 3, 5));

        let schedule = ScheduleGenerator::new(&config)
            .generate(&req, &client, 0, date(2024, 3, 1))
            .unwrap();

        assert_eq!(schedule.installments.len(), 12);
        let numbers: Vec<u32> = schedule.installments.iter().map(|p| p.installment_number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<_>>());
        assert_eq!(schedule.total_value().as_decimal(), dec!(150.75) * dec!(12));

        for p in &schedule.installments {
            assert_eq!(p.payment_status, PaymentStatus::Pending);
            assert_eq!(p.payment_date, None);
            assert_eq!(p.overdue_value, None);
            assert_eq!(p.payment_group_id, schedule.group.id);
            assert_eq!(p.total_installments, 12);
        }
        assert_eq!(schedule.installments[11].due_date, date(2025, 2, 5));
    }

    #[test]
    fn test_end_of_month_clamping() {
        let first = date(2024, 1, 31);
        assert_eq!(installment_due_date(first, 1).unwrap(), first);
        assert_eq!(installment_due_date(first, 2).unwrap(), date(2024, 2, 29));
        assert_eq!(installment_due_date(first, 3).unwrap(), date(2024, 3, 31));
        assert_eq!(installment_due_date(first, 4).unwrap(), date(2024, 4, 30));
        assert_eq!(installment_due_date(date(2023, 1, 31), 2).unwrap(), date(2023, 2, 28));
    }

    #[test]
    fn test_rates_default_from_client() {
        let config = EngineConfig::default();
        let client = client();
        let mut req = request(&client, Money::from_major(100), 1, date(2024, 1, 10));

        let schedule = ScheduleGenerator::new(&config)
            .generate(&req, &client, 0, date(2024, 1, 1))
            .unwrap();
        assert_eq!(schedule.group.late_fee_rate, Rate::from_percentage(2));
        assert_eq!(schedule.group.monthly_interest_rate, Rate::from_percentage(1));

        req.monthly_interest_rate = Some(Rate::ZERO);
        let schedule = ScheduleGenerator::new(&config)
            .generate(&req, &client, 0, date(2024, 1, 1))
            .unwrap();
        assert_eq!(schedule.group.monthly_interest_rate, Rate::ZERO);
    }

    #[test]
    fn test_group_name_counts_payer_groups() {
        let config = EngineConfig::default();
        let client = client();
        let req = request(&client, Money::from_major(100), 2, date(2024, 1, 10));

        let schedule = ScheduleGenerator::new(&config)
            .generate(&req, &client, 2, date(2024, 1, 1))
            .unwrap();
        assert_eq!(schedule.group.group_name, "52998224725-3");
        assert_eq!(schedule.group.creation_date, date(2024, 1, 1));
    }

    #[test]
    fn test_rejects_invalid_requests() {
        let config = EngineConfig::default();
        let client = client();
        let generator = ScheduleGenerator::new(&config);
        let today = date(2024, 1, 1);

        let zero = request(&client, Money::ZERO, 3, date(2024, 1, 10));
        assert!(matches!(
            generator.generate(&zero, &client, 0, today),
            Err(BillingError::InvalidAmount { .. })
        ));

        let none = request(&client, Money::from_major(10), 0, date(2024, 1, 10));
        assert!(matches!(
            generator.generate(&none, &client, 0, today),
            Err(BillingError::InvalidInstallmentCount { count: 0 })
        ));

        let mut bad_rate = request(&client, Money::from_major(10), 1, date(2024, 1, 10));
        bad_rate.late_fee_rate = Some(Rate::from_percentage(150));
        assert!(generator.generate(&bad_rate, &client, 0, today).is_err());

        let mut bad_doc = request(&client, Money::from_major(10), 1, date(2024, 1, 10));
        bad_doc.payer_document = "42".to_string();
        assert!(generator.generate(&bad_doc, &client, 0, today).is_err());
    }

    #[test]
    fn test_builder_requires_fields() {
        let err = NewPaymentGroup::builder()
            .monthly_value(Money::from_major(10))
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "clientId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "payerName": "Carlos Lima",
            "payerDocument": "52998224725",
            "payerPhone": null,
            "monthlyValue": 250.5,
            "totalInstallments": 3,
            "lateFeeRate": 0.02,
            "monthlyInterestRate": null,
            "firstInstallmentDueDate": "2024-01-31",
            "observation": null
        }"#;

        let req: NewPaymentGroup = serde_json::from_str(json).unwrap();
        assert_eq!(req.monthly_value, Money::from_minor(25050));
        assert_eq!(req.late_fee_rate, Some(Rate::from_percentage(2)));
        assert_eq!(req.monthly_interest_rate, None);
        assert_eq!(req.first_installment_due_date, date(2024, 1, 31));
    }
}
