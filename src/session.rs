use chrono::{DateTime, Utc};

use crate::errors::{BillingError, Result};

/// caller's session, passed explicitly with every request
///
/// tokens are issued and verified by the authentication layer; the engine only
/// checks that one is present and not expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    bearer_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new(bearer_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            bearer_token: Some(bearer_token.into()),
            expires_at: Some(expires_at),
        }
    }

    /// session without an expiry, for trusted internal callers
    pub fn without_expiry(bearer_token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(bearer_token.into()),
            expires_at: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            bearer_token: None,
            expires_at: None,
        }
    }

    /// parse an `Authorization` header value
    pub fn from_authorization_header(header: Option<&str>, expires_at: DateTime<Utc>) -> Self {
        match header.and_then(|h| h.trim().strip_prefix("Bearer ")) {
            Some(token) => Self::new(token.trim(), expires_at),
            None => Self::anonymous(),
        }
    }

    pub fn authorize(&self, now: DateTime<Utc>) -> Result<()> {
        match self.bearer_token.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(BillingError::Unauthorized {
                    message: "missing bearer token".to_string(),
                })
            }
            Some(_) => {}
        }
        match self.expires_at {
            Some(expiry) if now >= expiry => Err(BillingError::Unauthorized {
                message: format!("session expired at {expiry}"),
            }),
            _ => Ok(()),
        }
    }
}
