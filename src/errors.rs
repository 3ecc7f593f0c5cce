use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boleto::BoletoStatus;
use crate::decimal::{Money, Rate};
use crate::types::{ClientId, PaymentGroupId, PaymentId, PaymentStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("invalid document: {document:?} must have 11 (CPF) or 14 (CNPJ) digits")]
    InvalidDocument {
        document: String,
    },

    #[error("invalid amount: {amount} must be greater than zero")]
    InvalidAmount {
        amount: Money,
    },

    #[error("invalid {field} rate: {rate} must be a fraction in [0, 1)")]
    InvalidRate {
        field: &'static str,
        rate: Rate,
    },

    #[error("invalid installment count: {count}")]
    InvalidInstallmentCount {
        count: u32,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("client not found: {id}")]
    ClientNotFound {
        id: ClientId,
    },

    #[error("payment group not found: {id}")]
    PaymentGroupNotFound {
        id: PaymentGroupId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    #[error("payment {id} was changed concurrently: current status is {current}")]
    SettlementConflict {
        id: PaymentId,
        current: PaymentStatus,
    },

    #[error("a client with document {document} already exists")]
    DuplicateDocument {
        document: String,
    },

    #[error("client {id} still owns {groups} payment group(s)")]
    ClientHasPaymentGroups {
        id: ClientId,
        groups: usize,
    },

    #[error("no boleto for payment {payment_id}")]
    BoletoNotFound {
        payment_id: PaymentId,
    },

    #[error("payment {payment_id} already has a boleto with status {status}")]
    BoletoAlreadyExists {
        payment_id: PaymentId,
        status: BoletoStatus,
    },

    #[error("calculation error: {message}")]
    Calculation {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

impl BillingError {
    /// http status the transport layer reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            BillingError::InvalidDocument { .. }
            | BillingError::InvalidAmount { .. }
            | BillingError::InvalidRate { .. }
            | BillingError::InvalidInstallmentCount { .. }
            | BillingError::InvalidDate { .. }
            | BillingError::Validation { .. } => 400,
            BillingError::Unauthorized { .. } => 401,
            BillingError::ClientNotFound { .. }
            | BillingError::PaymentGroupNotFound { .. }
            | BillingError::PaymentNotFound { .. }
            | BillingError::BoletoNotFound { .. } => 404,
            BillingError::SettlementConflict { .. }
            | BillingError::DuplicateDocument { .. }
            | BillingError::ClientHasPaymentGroups { .. }
            | BillingError::BoletoAlreadyExists { .. } => 409,
            BillingError::Calculation { .. } | BillingError::Storage { .. } => 500,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.status_code() == 400
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status_code() == 409
    }

    /// the caller should end the session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BillingError::Unauthorized { .. })
    }
}

/// serializable error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl From<&BillingError> for ErrorResponse {
    fn from(err: &BillingError) -> Self {
        ErrorResponse {
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
