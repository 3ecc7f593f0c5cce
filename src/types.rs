use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{BillingError, Result};

/// unique identifier for a client
pub type ClientId = Uuid;

/// unique identifier for a payment group
pub type PaymentGroupId = Uuid;

/// unique identifier for an installment
pub type PaymentId = Uuid;

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// not yet due, or due today
    Pending,
    /// past due and unpaid
    Overdue,
    /// paid on or before the due date
    Paid,
    /// paid after the due date
    PaidLate,
}

impl PaymentStatus {
    /// no transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::PaidLate)
    }

    /// still awaiting payment
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// statuses that carry an overdue value
    pub fn carries_overdue_value(&self) -> bool {
        matches!(self, PaymentStatus::Overdue | PaymentStatus::PaidLate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Overdue => "OVERDUE",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::PaidLate => "PAID_LATE",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "OVERDUE" => Ok(PaymentStatus::Overdue),
            "PAID" => Ok(PaymentStatus::Paid),
            "PAID_LATE" => Ok(PaymentStatus::PaidLate),
            other => Err(BillingError::Validation {
                message: format!("unknown payment status: {other}"),
            }),
        }
    }
}

/// kind of brazilian tax identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// individual, 11 digits
    Cpf,
    /// company, 14 digits
    Cnpj,
}

/// CPF or CNPJ in canonical numeric-only form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Document(String);

impl Document {
    /// strip punctuation and check the digit count; checksums are not verified
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.chars().any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '/' | ' '))) {
            return Err(BillingError::InvalidDocument {
                document: raw.to_string(),
            });
        }

        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.len() {
            11 | 14 => Ok(Document(digits)),
            _ => Err(BillingError::InvalidDocument {
                document: raw.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        if self.0.len() == 11 {
            DocumentKind::Cpf
        } else {
            DocumentKind::Cnpj
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Document {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self> {
        Document::parse(&value)
    }
}

impl From<Document> for String {
    fn from(d: Document) -> Self {
        d.0
    }
}
