//! Order placement.
//!
//! Turns a user's cart into an order in two phases:
//!
//! 1. **Read**: load the cart resolved against the live catalog and run the
//!    pure checkout rules from [`novare_core::checkout`] (empty cart, missing
//!    products, stock), snapshotting names and prices.
//! 2. **Write**: hand the plan to a [`CheckoutStore`], which must create the
//!    order, decrement stock and remove the ordered cart lines atomically. Each
//!    decrement is conditional (`stock >= quantity`), so a concurrent checkout
//!    that drained a product between the two phases is reported as
//!    [`CheckoutError::InsufficientStock`] and nothing is written. The store
//!    also re-reads the consumed cart lines under lock; if another checkout
//!    already took them, or their quantity changed, the commit fails with
//!    [`CheckoutError::CartChanged`].
//!
//! The production store is [`crate::db::CheckoutRepository`]; tests use an
//! in-memory store.

use std::future::Future;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use novare_core::checkout::{self, CartEntry, CheckoutRuleError, DEFAULT_PAYMENT_METHOD};
use novare_core::{ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::order::generate_order_number;
use crate::models::{NewOrder, Order, ShippingAddress};

/// Persistence needed to place an order.
pub trait CheckoutStore: Send + Sync {
    /// Load the user's cart lines resolved against the current catalog, in
    /// cart order. Returns `None` if the user does not exist.
    fn load_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Vec<CartEntry>>, RepositoryError>> + Send;

    /// Atomically create the order, take each reservation out of stock with a
    /// conditional decrement, and delete the ordered cart lines.
    ///
    /// Every line in `order.plan.cart_lines` must still be in the cart with
    /// the planned quantity, or the commit fails with
    /// [`CommitError::CartChanged`].
    ///
    /// On any error nothing is written.
    fn commit_order(
        &self,
        order: NewOrder,
    ) -> impl Future<Output = Result<Order, CommitError>> + Send;
}

/// Why a store refused to commit an order.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A conditional decrement found less stock than reserved.
    #[error("insufficient stock for {name}")]
    InsufficientStock { product_id: ProductId, name: String },

    /// A product was deleted after the cart was read.
    #[error("product {0} no longer exists")]
    ProductNotFound(ProductId),

    /// A consumed cart line was removed or resized after the cart was read,
    /// typically by a second checkout of the same cart.
    #[error("cart changed during checkout")]
    CartChanged,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("user not found")]
    UserNotFound,

    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("insufficient stock for {name}")]
    InsufficientStock { product_id: ProductId, name: String },

    #[error("cart changed during checkout")]
    CartChanged,

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<CheckoutRuleError> for CheckoutError {
    fn from(err: CheckoutRuleError) -> Self {
        match err {
            CheckoutRuleError::EmptyCart => Self::EmptyCart,
            CheckoutRuleError::ProductNotFound(id) => Self::ProductNotFound(id),
            CheckoutRuleError::InsufficientStock { product_id, name } => {
                Self::InsufficientStock { product_id, name }
            }
            err @ CheckoutRuleError::InvalidQuantity { .. } => Self::Validation(err.to_string()),
        }
    }
}

impl From<CommitError> for CheckoutError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::InsufficientStock { product_id, name } => {
                Self::InsufficientStock { product_id, name }
            }
            CommitError::ProductNotFound(id) => Self::ProductNotFound(id),
            CommitError::CartChanged => Self::CartChanged,
            CommitError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Request body for placing an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Place an order from the user's cart.
///
/// # Errors
///
/// - [`CheckoutError::Validation`] for a malformed shipping address
/// - [`CheckoutError::UserNotFound`] if the user no longer exists
/// - [`CheckoutError::EmptyCart`], [`CheckoutError::ProductNotFound`] or
///   [`CheckoutError::InsufficientStock`] when the cart cannot be fulfilled;
///   in every such case the cart, catalog and orders are left unchanged
/// - [`CheckoutError::CartChanged`] when the cart was checked out or edited
///   concurrently; nothing is written and the client may retry
/// - [`CheckoutError::Repository`] for storage failures
#[instrument(skip(store, request), fields(user_id = %user_id))]
pub async fn place_order<S: CheckoutStore>(
    store: &S,
    user_id: UserId,
    request: PlaceOrderRequest,
) -> Result<Order, CheckoutError> {
    let shipping_address = request
        .shipping_address
        .normalized()
        .map_err(CheckoutError::Validation)?;
    let payment_method = request
        .payment_method
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_owned());

    let cart = store
        .load_cart(user_id)
        .await?
        .ok_or(CheckoutError::UserNotFound)?;

    let plan = checkout::plan(&cart).inspect_err(|e| {
        tracing::info!(error = %e, "Cart rejected at checkout");
    })?;

    let order = store
        .commit_order(NewOrder {
            order_number: generate_order_number(Utc::now()),
            user_id,
            shipping_address,
            payment_method,
            plan,
        })
        .await
        .inspect_err(|e| {
            tracing::warn!(error = %e, "Order commit failed");
        })?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total_price,
        lines = order.items.len(),
        "Order placed"
    );

    Ok(order)
}
