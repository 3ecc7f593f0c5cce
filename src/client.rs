use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::Rate;
use crate::errors::{BillingError, Result};
use crate::types::{ClientId, Document};

/// a payer registered with the billing system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub document: Document,
    pub phone: Option<String>,
    pub address: String,
    pub bank: Option<String>,
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
}

/// default rates a client lends to its payment groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRates {
    pub late_fee_rate: Rate,
    pub monthly_interest_rate: Rate,
}

impl Client {
    pub fn rates(&self) -> ClientRates {
        ClientRates {
            late_fee_rate: self.late_fee_rate,
            monthly_interest_rate: self.monthly_interest_rate,
        }
    }

    /// register a new client from a request, normalizing name and document
    pub fn register(request: NewClient, config: &EngineConfig) -> Result<Self> {
        let name = normalized_name(&request.client_name, config)?;
        let document = Document::parse(&request.document)?;
        let address = required_text("address", &request.address)?;

        let late_fee_rate = request.late_fee_rate.unwrap_or(config.default_late_fee_rate);
        let monthly_interest_rate = request
            .monthly_interest_rate
            .unwrap_or(config.default_monthly_interest_rate);
        validate_rates(late_fee_rate, monthly_interest_rate)?;

        Ok(Client {
            id: Uuid::new_v4(),
            name,
            document,
            phone: optional_text(request.phone),
            address,
            bank: optional_text(request.bank),
            late_fee_rate,
            monthly_interest_rate,
        })
    }

    /// apply a partial update; fields absent from the request are left unchanged
    pub fn apply_update(&self, update: ClientUpdate, config: &EngineConfig) -> Result<Self> {
        let mut updated = self.clone();

        if let Some(name) = update.client_name {
            updated.name = normalized_name(&name, config)?;
        }
        if let Some(address) = update.address {
            updated.address = required_text("address", &address)?;
        }
        if let Some(phone) = update.phone {
            updated.phone = optional_text(Some(phone));
        }
        if let Some(document) = update.document {
            updated.document = Document::parse(&document)?;
        }
        if let Some(bank) = update.bank {
            updated.bank = optional_text(Some(bank));
        }
        if let Some(rate) = update.late_fee_rate {
            updated.late_fee_rate = rate;
        }
        if let Some(rate) = update.monthly_interest_rate {
            updated.monthly_interest_rate = rate;
        }
        validate_rates(updated.late_fee_rate, updated.monthly_interest_rate)?;

        Ok(updated)
    }
}

/// body of `POST /client`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub client_name: String,
    pub address: String,
    pub phone: Option<String>,
    pub document: String,
    pub bank: Option<String>,
    pub late_fee_rate: Option<Rate>,
    pub monthly_interest_rate: Option<Rate>,
}

/// body of `PUT /client/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub client_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub bank: Option<String>,
    pub late_fee_rate: Option<Rate>,
    pub monthly_interest_rate: Option<Rate>,
}

pub fn validate_rates(late_fee_rate: Rate, monthly_interest_rate: Rate) -> Result<()> {
    if !late_fee_rate.is_valid_fraction() {
        return Err(BillingError::InvalidRate {
            field: "late fee",
            rate: late_fee_rate,
        });
    }
    if !monthly_interest_rate.is_valid_fraction() {
        return Err(BillingError::InvalidRate {
            field: "monthly interest",
            rate: monthly_interest_rate,
        });
    }
    Ok(())
}

/// title-case each word and collapse runs of whitespace
pub fn to_title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalized_name(raw: &str, config: &EngineConfig) -> Result<String> {
    let name = to_title_case(raw);
    if name.is_empty() {
        return Err(BillingError::Validation {
            message: "client name must not be blank".to_string(),
        });
    }
    if name.chars().count() > config.max_name_length {
        return Err(BillingError::Validation {
            message: format!("client name exceeds {} characters", config.max_name_length),
        });
    }
    Ok(name)
}

fn required_text(field: &str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BillingError::Validation {
            message: format!("{field} must not be blank"),
        });
    }
    Ok(trimmed.to_string())
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> NewClient {
        NewClient {
            client_name: "  maria   DA silva ".to_string(),
            address: "Rua das Flores, 10".to_string(),
            phone: Some("11999990000".to_string()),
            document: "123.456.789-09".to_string(),
            bank: None,
            late_fee_rate: Some(Rate::from_percentage(2)),
            monthly_interest_rate: Some(Rate::from_percentage(1)),
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(to_title_case("jOÃO   pedro"), "João Pedro");
        assert_eq!(to_title_case("   "), "");
    }

    #[test]
    fn test_register_normalizes() {
        let client = Client::register(request(), &EngineConfig::default()).unwrap();

        assert_eq!(client.name, "Maria Da Silva");
        assert_eq!(client.document.as_str(), "12345678909");
        assert_eq!(client.late_fee_rate, Rate::from_decimal(dec!(0.02)));
        assert_eq!(client.bank, None);
    }

    #[test]
    fn test_register_defaults_rates_from_config() {
        let mut req = request();
        req.late_fee_rate = None;
        req.monthly_interest_rate = None;

        let mut config = EngineConfig::default();
        config.default_monthly_interest_rate = Rate::from_percentage(1);

        let client = Client::register(req, &config).unwrap();
        assert_eq!(client.late_fee_rate, Rate::ZERO);
        assert_eq!(client.monthly_interest_rate, Rate::from_percentage(1));
    }

    #[test]
    fn test_register_rejects_invalid_input() {
        let config = EngineConfig::default();

        let mut bad_rate = request();
        bad_rate.late_fee_rate = Some(Rate::from_percentage(100));
        assert!(matches!(
            Client::register(bad_rate, &config),
            Err(BillingError::InvalidRate { .. })
        ));

        let mut bad_doc = request();
        bad_doc.document = "123".to_string();
        assert!(matches!(
            Client::register(bad_doc, &config),
            Err(BillingError::InvalidDocument { .. })
        ));

        let mut blank = request();
        blank.client_name = "   ".to_string();
        assert!(Client::register(blank, &config).is_err());
    }

    #[test]
    fn test_partial_update() {
        let config = EngineConfig::default();
        let client = Client::register(request(), &config).unwrap();

        let updated = client
            .apply_update(
                ClientUpdate {
                    bank: Some("Banco Inter".to_string()),
                    monthly_interest_rate: Some(Rate::from_bps(150)),
                    ..ClientUpdate::default()
                },
                &config,
            )
            .unwrap();

        assert_eq!(updated.id, client.id);
        assert_eq!(updated.name, client.name);
        assert_eq!(updated.bank.as_deref(), Some("Banco Inter"));
        assert_eq!(updated.monthly_interest_rate, Rate::from_bps(150));
        assert_eq!(updated.late_fee_rate, client.late_fee_rate);
    }
}
