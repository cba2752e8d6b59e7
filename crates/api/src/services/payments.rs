//! Payment initialization and verification.
//!
//! The gateway is only trusted through [`PaymentGateway::verify`]: the
//! redirect that triggers verification is unauthenticated, so the order is
//! moved to `processing` only after the gateway itself reports `success` for
//! the reference. Recording is conditional on the order still being
//! `pending`, which makes repeated verification a no-op.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use novare_core::{CurrencyCode, OrderId, OrderStatus, Price, UserId};

use crate::db::RepositoryError;
use crate::models::{CurrentUser, Order, PaymentResult};

/// Gateway status string for a settled charge.
pub const SUCCESS_STATUS: &str = "success";

/// A transaction to open with the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeTransaction {
    pub email: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub callback_url: Option<String>,
    pub order_id: OrderId,
    pub user_id: UserId,
}

/// Where to send the shopper to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// A transaction as re-fetched from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransaction {
    /// Gateway transaction id.
    pub id: String,
    pub status: String,
    pub reference: String,
    /// Amount in minor units.
    pub amount: i64,
    pub email: Option<String>,
    /// Order id from the transaction metadata, if present.
    pub order_id: Option<OrderId>,
}

/// Errors talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Gateway answered but refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A payment gateway.
pub trait PaymentGateway: Send + Sync {
    /// Open a transaction and return the checkout authorization.
    fn initialize(
        &self,
        request: &InitializeTransaction,
    ) -> impl Future<Output = Result<Authorization, GatewayError>> + Send;

    /// Re-fetch a transaction by reference.
    fn verify(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<VerifiedTransaction, GatewayError>> + Send;
}

/// Result of trying to record a confirmed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRecord {
    /// The order moved from `pending` to `processing`.
    Recorded,
    /// The order was not `pending`; nothing changed.
    Unchanged(OrderStatus),
    OrderNotFound,
}

/// Order persistence needed by payments.
pub trait PaymentLedger: Send + Sync {
    fn find_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Store the payment result and move the order to `processing`, only if it
    /// is still `pending`.
    fn record_payment(
        &self,
        id: OrderId,
        result: PaymentResult,
    ) -> impl Future<Output = Result<PaymentRecord, RepositoryError>> + Send;
}

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("order not found")]
    OrderNotFound,

    #[error("not allowed to pay for this order")]
    Forbidden,

    #[error("order {order_id} is {status} and cannot be paid")]
    NotPayable {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("payment reference is required")]
    InvalidReference,

    #[error("transaction does not reference an order")]
    MissingOrderReference,

    #[error("order total cannot be charged")]
    InvalidAmount,

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Request body for opening a payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub email: Option<String>,
}

/// How a verification ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The gateway reported success. `transitioned` is false when the order
    /// had already left `pending`.
    Confirmed { order_id: OrderId, transitioned: bool },
    /// The gateway reported a non-success status; the order was not touched.
    Declined {
        order_id: Option<OrderId>,
        gateway_status: String,
    },
}

/// Open a gateway transaction for a pending order.
///
/// # Errors
///
/// - [`PaymentError::OrderNotFound`] / [`PaymentError::Forbidden`] when the
///   order is missing or belongs to someone else (admins may pay any order)
/// - [`PaymentError::NotPayable`] unless the order is `pending`
/// - [`PaymentError::Gateway`] if the gateway call fails
#[instrument(skip(gateway, ledger, user, request), fields(user_id = %user.id, order_id = %request.order_id))]
pub async fn initialize_payment<G: PaymentGateway, L: PaymentLedger>(
    gateway: &G,
    ledger: &L,
    user: &CurrentUser,
    request: &InitializePaymentRequest,
    currency: CurrencyCode,
    callback_url: Option<&str>,
) -> Result<Authorization, PaymentError> {
    let order = ledger
        .find_order(request.order_id)
        .await?
        .ok_or(PaymentError::OrderNotFound)?;

    if !user.can_access(order.user_id) {
        return Err(PaymentError::Forbidden);
    }
    if !order.status.awaits_payment() {
        return Err(PaymentError::NotPayable {
            order_id: order.id,
            status: order.status,
        });
    }

    let amount = Price::new(order.total_price, currency)
        .minor_units()
        .ok_or(PaymentError::InvalidAmount)?;
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map_or_else(|| user.email.to_string(), ToOwned::to_owned);

    let authorization = gateway
        .initialize(&InitializeTransaction {
            email,
            amount,
            currency,
            callback_url: callback_url.map(ToOwned::to_owned),
            order_id: order.id,
            user_id: order.user_id,
        })
        .await?;

    tracing::info!(reference = %authorization.reference, amount, "Payment initialized");
    Ok(authorization)
}

/// Verify a transaction with the gateway and record it if it succeeded.
///
/// # Errors
///
/// - [`PaymentError::InvalidReference`] for a blank reference
/// - [`PaymentError::MissingOrderReference`] if a successful transaction
///   carries no order id
/// - [`PaymentError::OrderNotFound`] if that order does not exist
/// - [`PaymentError::Gateway`] if the gateway call fails
#[instrument(skip(gateway, ledger))]
pub async fn verify_payment<G: PaymentGateway, L: PaymentLedger>(
    gateway: &G,
    ledger: &L,
    reference: &str,
) -> Result<VerificationOutcome, PaymentError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(PaymentError::InvalidReference);
    }

    let transaction = gateway.verify(reference).await?;

    if transaction.status != SUCCESS_STATUS {
        tracing::info!(gateway_status = %transaction.status, "Payment not successful");
        return Ok(VerificationOutcome::Declined {
            order_id: transaction.order_id,
            gateway_status: transaction.status,
        });
    }

    let order_id = transaction
        .order_id
        .ok_or(PaymentError::MissingOrderReference)?;

    let record = ledger
        .record_payment(
            order_id,
            PaymentResult {
                id: transaction.id,
                status: transaction.status,
                reference: transaction.reference,
                email: transaction.email,
            },
        )
        .await?;

    match record {
        PaymentRecord::Recorded => Ok(VerificationOutcome::Confirmed {
            order_id,
            transitioned: true,
        }),
        PaymentRecord::Unchanged(status) => {
            if status == OrderStatus::Cancelled {
                tracing::warn!(order_id = %order_id, "Payment confirmed for a cancelled order");
            }
            Ok(VerificationOutcome::Confirmed {
                order_id,
                transitioned: false,
            })
        }
        PaymentRecord::OrderNotFound => Err(PaymentError::OrderNotFound),
    }
}
