//! Shopping cart types.

use rust_decimal::Decimal;
use serde::Serialize;

use novare_core::checkout::CartEntry;
use novare_core::{CartLineId, Size};

use super::Product;

/// One line of a user's cart with its product resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartLineId,
    pub product: Product,
    pub quantity: i32,
    pub size: Size,
}

impl CartLine {
    /// Current catalog price times quantity.
    ///
    /// Informational only; the order snapshots prices at checkout.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }

    /// The line as checkout sees it.
    #[must_use]
    pub fn entry(&self) -> CartEntry {
        CartEntry {
            line_id: self.id,
            product_id: self.product.id,
            quantity: self.quantity,
            size: self.size,
            product: Some(self.product.catalog_entry()),
        }
    }
}

/// A user's cart in insertion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl Cart {
    #[must_use]
    pub fn new(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|line| i64::from(line.quantity)).sum();
        let subtotal = lines.iter().map(CartLine::subtotal).sum();
        Self {
            lines,
            item_count,
            subtotal,
        }
    }
}
