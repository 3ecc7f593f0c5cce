use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{BillingError, Result};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// offset of the business calendar from UTC, in minutes
    #[serde(default = "default_business_utc_offset_minutes")]
    pub business_utc_offset_minutes: i32,
    /// late fee applied to clients registered without one
    #[serde(default)]
    pub default_late_fee_rate: Rate,
    /// monthly interest applied to clients registered without one
    #[serde(default)]
    pub default_monthly_interest_rate: Rate,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_max_observation_length")]
    pub max_observation_length: usize,
    /// issue boletos through the offline mock bank when no real integration is registered
    #[serde(default = "default_mock_bank_enabled")]
    pub mock_bank_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            business_utc_offset_minutes: default_business_utc_offset_minutes(),
            default_late_fee_rate: Rate::ZERO,
            default_monthly_interest_rate: Rate::ZERO,
            max_name_length: default_max_name_length(),
            max_observation_length: default_max_observation_length(),
            mock_bank_enabled: default_mock_bank_enabled(),
        }
    }
}

// America/Sao_Paulo, no daylight saving since 2019
fn default_business_utc_offset_minutes() -> i32 {
    -180
}

fn default_max_name_length() -> usize {
    100
}

fn default_max_observation_length() -> usize {
    400
}

fn default_mock_bank_enabled() -> bool {
    true
}

impl EngineConfig {
    /// config for a business running on UTC dates
    pub fn utc() -> Self {
        Self {
            business_utc_offset_minutes: 0,
            ..Self::default()
        }
    }

    /// parse and validate a json config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| BillingError::Validation {
                message: format!("invalid engine config: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.business_offset().is_none() {
            return Err(BillingError::Validation {
                message: format!(
                    "business utc offset out of range: {} minutes",
                    self.business_utc_offset_minutes
                ),
            });
        }
        if !self.default_late_fee_rate.is_valid_fraction() {
            return Err(BillingError::InvalidRate {
                field: "late fee",
                rate: self.default_late_fee_rate,
            });
        }
        if !self.default_monthly_interest_rate.is_valid_fraction() {
            return Err(BillingError::InvalidRate {
                field: "monthly interest",
                rate: self.default_monthly_interest_rate,
            });
        }
        if self.max_name_length == 0 {
            return Err(BillingError::Validation {
                message: "max_name_length must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn business_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.business_utc_offset_minutes.checked_mul(60)?)
    }

    /// calendar date of an instant in the business timezone
    pub fn business_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self.business_offset() {
            Some(offset) => instant.with_timezone(&offset).date_naive(),
            None => instant.date_naive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.business_utc_offset_minutes, -180);
        assert_eq!(config.default_late_fee_rate, Rate::ZERO);
        assert_eq!(config.max_observation_length, 400);
        assert!(config.mock_bank_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(
            r#"{"business_utc_offset_minutes": 0, "default_late_fee_rate": 0.02}"#,
        )
        .unwrap();

        assert_eq!(config.business_utc_offset_minutes, 0);
        assert_eq!(config.default_late_fee_rate, Rate::from_decimal(dec!(0.02)));
        assert_eq!(config.max_name_length, 100);
    }

    #[test]
    fn test_from_json_rejects_unknown_fields_and_bad_rates() {
        assert!(EngineConfig::from_json(r#"{"timezone": "UTC"}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"default_monthly_interest_rate": 1.5}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"business_utc_offset_minutes": 100000}"#).is_err());
    }

    #[test]
    fn test_business_date_uses_offset() {
        // 01:30 UTC on the 11th is still the 10th in São Paulo
        let instant = Utc.with_ymd_and_hms(2024, 2, 11, 1, 30, 0).unwrap();

        let sao_paulo = EngineConfig::default();
        assert_eq!(
            sao_paulo.business_date(instant),
            NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
        );
        assert_eq!(
            EngineConfig::utc().business_date(instant),
            NaiveDate::from_ymd_opt(2024, 2, 11).unwrap()
        );
    }
}
