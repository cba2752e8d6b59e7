//! Paystack payment route handlers.

use axum::{
    Json,
    extract::State,
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::Result;
use crate::extract::{AppJson, AppQuery};
use crate::middleware::RequireAuth;
use crate::routes::{Envelope, ok};
use crate::services::payments::{
    Authorization, InitializePaymentRequest, VerificationOutcome, initialize_payment,
    verify_payment,
};
use crate::state::AppState;

/// Query string Paystack appends to the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

impl VerifyQuery {
    fn reference(&self) -> &str {
        self.reference
            .as_deref()
            .or(self.trxref.as_deref())
            .unwrap_or_default()
    }
}

/// Where the shopper lands after verification.
fn redirect_target(client_url: &str, outcome: Option<&VerificationOutcome>) -> String {
    match outcome {
        Some(VerificationOutcome::Confirmed { order_id, .. }) => {
            format!("{client_url}/order/{order_id}?payment=success")
        }
        _ => format!("{client_url}/cart?payment=failed"),
    }
}

/// Open a Paystack transaction for a pending order.
pub async fn initialize(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppJson(request): AppJson<InitializePaymentRequest>,
) -> Result<Json<Envelope<Authorization>>> {
    let config = &state.config().paystack;
    let authorization = initialize_payment(
        state.paystack(),
        &OrderRepository::new(state.pool()),
        &user,
        &request,
        config.currency,
        config.callback_url.as_deref(),
    )
    .await?;
    Ok(ok(authorization))
}

/// Gateway redirect target: verify the transaction, then send the shopper
/// back to the storefront.
#[instrument(skip(state))]
pub async fn verify(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<VerifyQuery>,
) -> Redirect {
    let outcome = verify_payment(
        state.paystack(),
        &OrderRepository::new(state.pool()),
        query.reference(),
    )
    .await;

    let outcome = match outcome {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "Payment verification failed");
            sentry::capture_error(&e);
            None
        }
    };

    Redirect::to(&redirect_target(
        &state.config().client_url,
        outcome.as_ref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use novare_core::OrderId;

    #[test]
    fn test_confirmed_redirects_to_order() {
        let outcome = VerificationOutcome::Confirmed {
            order_id: OrderId::new(42),
            transitioned: false,
        };
        assert_eq!(
            redirect_target("https://shop.example", Some(&outcome)),
            "https://shop.example/order/42?payment=success"
        );
    }

    #[test]
    fn test_declined_or_failed_redirects_to_cart() {
        let declined = VerificationOutcome::Declined {
            order_id: Some(OrderId::new(42)),
            gateway_status: "abandoned".to_owned(),
        };
        assert_eq!(
            redirect_target("https://shop.example", Some(&declined)),
            "https://shop.example/cart?payment=failed"
        );
        assert_eq!(
            redirect_target("https://shop.example", None),
            "https://shop.example/cart?payment=failed"
        );
    }

    #[test]
    fn test_reference_falls_back_to_trxref() {
        let query = VerifyQuery {
            reference: None,
            trxref: Some("T123".to_owned()),
        };
        assert_eq!(query.reference(), "T123");
        assert_eq!(VerifyQuery::default().reference(), "");
    }
}
