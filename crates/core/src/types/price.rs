//! Decimal prices and the currency the store charges in.
//!
//! Catalog and order amounts are stored as `NUMERIC(12,2)` in the major unit
//! (naira, dollars). The payment gateway wants integer minor units (kobo,
//! cents), so conversion lives next to the type.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., naira, not kobo).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Amount in minor units (kobo for NGN, cents for USD).
    ///
    /// Returns `None` for negative amounts, amounts with sub-minor-unit
    /// precision, or amounts that overflow `i64`.
    #[must_use]
    pub fn minor_units(&self) -> Option<i64> {
        if self.amount.is_sign_negative() {
            return None;
        }
        let minor = self.amount.checked_mul(Decimal::ONE_HUNDRED)?;
        if minor.fract() != Decimal::ZERO {
            return None;
        }
        minor.to_i64()
    }
}

/// ISO 4217 currency codes the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    NGN,
    GHS,
    ZAR,
    KES,
    USD,
}

impl CurrencyCode {
    /// The three-letter code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NGN => "NGN",
            Self::GHS => "GHS",
            Self::ZAR => "ZAR",
            Self::KES => "KES",
            Self::USD => "USD",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NGN" => Ok(Self::NGN),
            "GHS" => Ok(Self::GHS),
            "ZAR" => Ok(Self::ZAR),
            "KES" => Ok(Self::KES),
            "USD" => Ok(Self::USD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}
