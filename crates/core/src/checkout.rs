//! Checkout rules shared by every order store.
//!
//! Placing an order is split in two phases. The read phase (this module) takes
//! the user's cart resolved against the live catalog and either rejects it or
//! produces a [`CheckoutPlan`]: the snapshotted line items, the totals and the
//! per-product stock reservations. The write phase belongs to the store, which
//! must apply the plan atomically and re-check every reservation with a
//! conditional decrement.
//!
//! # Example
//!
//! ```
//! use novare_core::checkout::{self, CartEntry, CatalogProduct, SHIPPING_PRICE};
//! use novare_core::{CartLineId, ProductId, Size};
//! use rust_decimal::Decimal;
//!
//! let cart = vec![CartEntry {
//!     line_id: CartLineId::new(1),
//!     product_id: ProductId::new(10),
//!     quantity: 2,
//!     size: Size::Medium,
//!     product: Some(CatalogProduct {
//!         name: "Essential Tee".to_owned(),
//!         price: Decimal::new(100, 0),
//!         stock: 5,
//!     }),
//! }];
//!
//! let plan = checkout::plan(&cart).unwrap();
//! assert_eq!(plan.total_price, Decimal::new(200, 0) + SHIPPING_PRICE);
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CartLineId, ProductId, Size};

/// Flat shipping price added to every order, in the store currency.
pub const SHIPPING_PRICE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

/// Payment method recorded when the client does not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "paystack";

/// The live catalog fields checkout reads for a cart line's product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

/// One cart line resolved against the catalog.
///
/// `product` is `None` when the product has been deleted since the line was
/// added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub size: Size,
    pub product: Option<CatalogProduct>,
}

/// An order line copied by value from the catalog at checkout time.
///
/// Later catalog edits never reach an existing line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub size: Size,
}

impl LineItem {
    /// `price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Units of one product the write phase must take out of stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReservation {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
}

/// A cart line as it was when the plan was built.
///
/// The write phase must find every consumed line still in the cart with the
/// same quantity, otherwise the cart changed underneath the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedLine {
    pub line_id: CartLineId,
    pub quantity: i32,
}

/// A validated cart, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    /// Snapshotted line items in cart order.
    pub items: Vec<LineItem>,
    /// Per-product reservations, one per product, in ascending product id.
    ///
    /// Stores lock rows in this order so concurrent checkouts cannot deadlock.
    pub reservations: Vec<StockReservation>,
    /// Cart lines consumed by this order.
    pub cart_lines: Vec<ConsumedLine>,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

/// Why a cart cannot be checked out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutRuleError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} no longer exists")]
    ProductNotFound(ProductId),

    #[error("insufficient stock for {name}")]
    InsufficientStock { product_id: ProductId, name: String },

    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },
}

/// Validate a resolved cart and build its checkout plan.
///
/// Lines for the same product in different sizes draw from one stock count,
/// so availability is checked against the summed quantity.
///
/// # Errors
///
/// Returns the first rule the cart breaks: [`CheckoutRuleError::EmptyCart`],
/// then per line in cart order a missing product or a non-positive quantity,
/// then [`CheckoutRuleError::InsufficientStock`] for the lowest product id
/// that cannot be covered.
pub fn plan(cart: &[CartEntry]) -> Result<CheckoutPlan, CheckoutRuleError> {
    if cart.is_empty() {
        return Err(CheckoutRuleError::EmptyCart);
    }

    let mut items = Vec::with_capacity(cart.len());
    let mut demand: BTreeMap<ProductId, (i64, &CatalogProduct)> = BTreeMap::new();

    for entry in cart {
        let product = entry
            .product
            .as_ref()
            .ok_or(CheckoutRuleError::ProductNotFound(entry.product_id))?;

        if entry.quantity < 1 {
            return Err(CheckoutRuleError::InvalidQuantity {
                product_id: entry.product_id,
                quantity: entry.quantity,
            });
        }

        demand
            .entry(entry.product_id)
            .or_insert((0, product))
            .0 += i64::from(entry.quantity);

        items.push(LineItem {
            product_id: entry.product_id,
            name: product.name.clone(),
            price: product.price,
            quantity: entry.quantity,
            size: entry.size,
        });
    }

    let mut reservations = Vec::with_capacity(demand.len());
    for (product_id, (wanted, product)) in demand {
        let quantity = i32::try_from(wanted)
            .ok()
            .filter(|_| wanted <= i64::from(product.stock))
            .ok_or_else(|| CheckoutRuleError::InsufficientStock {
                product_id,
                name: product.name.clone(),
            })?;
        reservations.push(StockReservation {
            product_id,
            name: product.name.clone(),
            quantity,
        });
    }

    let items_price = items_price(&items);
    Ok(CheckoutPlan {
        cart_lines: cart
            .iter()
            .map(|entry| ConsumedLine {
                line_id: entry.line_id,
                quantity: entry.quantity,
            })
            .collect(),
        total_price: items_price + SHIPPING_PRICE,
        shipping_price: SHIPPING_PRICE,
        items_price,
        items,
        reservations,
    })
}

/// Sum of line-item subtotals, without shipping.
#[must_use]
pub fn items_price(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::subtotal).sum()
}

/// Order total: items plus shipping.
#[must_use]
pub fn order_total(items: &[LineItem], shipping_price: Decimal) -> Decimal {
    items_price(items) + shipping_price
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(line: i32, product: i32, price: i64, quantity: i32, stock: i32) -> CartEntry {
        CartEntry {
            line_id: CartLineId::new(line),
            product_id: ProductId::new(product),
            quantity,
            size: Size::Medium,
            product: Some(CatalogProduct {
                name: format!("Product {product}"),
                price: Decimal::new(price, 0),
                stock,
            }),
        }
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        assert_eq!(plan(&[]), Err(CheckoutRuleError::EmptyCart));
    }

    #[test]
    fn test_sufficient_stock_builds_snapshot_and_total() {
        let plan = plan(&[entry(1, 1, 100, 2, 5)]).unwrap();

        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].price, Decimal::new(100, 0));
        assert_eq!(plan.items[0].name, "Product 1");
        assert_eq!(plan.items_price, Decimal::new(200, 0));
        assert_eq!(plan.shipping_price, Decimal::new(15, 0));
        assert_eq!(plan.total_price, Decimal::new(215, 0));
        assert_eq!(
            plan.cart_lines,
            vec![ConsumedLine {
                line_id: CartLineId::new(1),
                quantity: 2,
            }]
        );
        assert_eq!(
            plan.reservations,
            vec![StockReservation {
                product_id: ProductId::new(1),
                name: "Product 1".to_owned(),
                quantity: 2,
            }]
        );
    }

    #[test]
    fn test_out_of_stock_line_names_the_product() {
        let cart = [entry(1, 1, 100, 2, 5), entry(2, 2, 50, 1, 0)];

        assert_eq!(
            plan(&cart),
            Err(CheckoutRuleError::InsufficientStock {
                product_id: ProductId::new(2),
                name: "Product 2".to_owned(),
            })
        );
    }

    #[test]
    fn test_missing_product_is_reported() {
        let mut gone = entry(1, 9, 10, 1, 1);
        gone.product = None;

        assert_eq!(
            plan(&[gone]),
            Err(CheckoutRuleError::ProductNotFound(ProductId::new(9)))
        );
    }

    #[test]
    fn test_sizes_of_one_product_share_stock() {
        let mut large = entry(2, 1, 100, 3, 5);
        large.size = Size::Large;
        let cart = [entry(1, 1, 100, 3, 5), large];

        assert!(matches!(
            plan(&cart),
            Err(CheckoutRuleError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_reservations_are_sorted_and_merged() {
        let mut small = entry(3, 7, 20, 1, 10);
        small.size = Size::Small;
        let cart = [entry(1, 7, 20, 2, 10), entry(2, 3, 40, 1, 10), small];

        let plan = plan(&cart).unwrap();
        let reserved: Vec<_> = plan
            .reservations
            .iter()
            .map(|r| (r.product_id.as_i32(), r.quantity))
            .collect();

        assert_eq!(reserved, vec![(3, 1), (7, 3)]);
        assert_eq!(plan.items.len(), 3);
        assert_eq!(plan.total_price, Decimal::new(20 * 3 + 40 + 15, 0));
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        assert!(matches!(
            plan(&[entry(1, 1, 10, 0, 5)]),
            Err(CheckoutRuleError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_order_total_with_fractional_prices() {
        let items = vec![LineItem {
            product_id: ProductId::new(1),
            name: "Cap".to_owned(),
            price: Decimal::new(1999, 2),
            quantity: 3,
            size: Size::Small,
        }];

        assert_eq!(
            order_total(&items, SHIPPING_PRICE),
            Decimal::new(7497, 2)
        );
    }
}
