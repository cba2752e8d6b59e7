//! Order types.
//!
//! An [`Order`] is immutable once placed apart from its status, payment result
//! and timestamps. Line items are [`LineItem`] snapshots copied from the
//! catalog at checkout.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use novare_core::checkout::{CheckoutPlan, LineItem};
use novare_core::{OrderId, OrderStatus, UserId};

/// Prefix of every human-readable order number.
pub const ORDER_NUMBER_PREFIX: &str = "NV";

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    pub country: String,
}

impl ShippingAddress {
    /// Trim every field and require street, city and country.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first blank required field.
    pub fn normalized(self) -> Result<Self, String> {
        fn required(value: &str, field: &str) -> Result<String, String> {
            let value = value.trim();
            if value.is_empty() {
                return Err(format!("shipping address {field} is required"));
            }
            Ok(value.to_owned())
        }

        fn optional(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }

        Ok(Self {
            street: required(&self.street, "street")?,
            city: required(&self.city, "city")?,
            state: optional(self.state),
            zip_code: optional(self.zip_code),
            country: required(&self.country, "country")?,
        })
    }
}

/// What the payment gateway reported for a confirmed charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Gateway transaction id.
    pub id: String,
    pub status: String,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub payment_result: Option<PaymentResult>,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order ready to be written by a checkout store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub plan: CheckoutPlan,
}

/// Generate an order number like `NV-20260301-3F9A0C`.
///
/// The suffix is 24 random bits, upper-case hex. The database enforces
/// uniqueness.
#[must_use]
pub fn generate_order_number(placed_at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(0..0x0100_0000);
    format!(
        "{ORDER_NUMBER_PREFIX}-{}-{suffix:06X}",
        placed_at.format("%Y%m%d")
    )
}
