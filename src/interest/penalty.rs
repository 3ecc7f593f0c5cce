use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::Result;

/// one-time penalty charged when an installment falls overdue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateFee {
    pub rate: Rate,
}

impl LateFee {
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }

    /// multiplier applied to the original value, `1 + rate`
    pub fn factor(&self) -> Decimal {
        self.rate.growth_factor()
    }

    /// fee amount on `base`, for display
    pub fn fee_on(&self, base: Money) -> Result<Money> {
        base.scale_by(self.rate.as_decimal())
    }

    pub fn is_waived(&self) -> bool {
        self.rate.is_zero()
    }
}
