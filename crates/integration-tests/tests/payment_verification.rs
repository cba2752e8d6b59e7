//! Payment initialization and verification against the in-memory ledger and
//! a stub gateway.
//!
//! Run with: cargo test -p novare-integration-tests --test payment_verification

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use novare_api::models::{CurrentUser, Order, ShippingAddress};
use novare_api::services::checkout::{PlaceOrderRequest, place_order};
use novare_api::services::payments::{
    InitializePaymentRequest, PaymentError, VerificationOutcome, initialize_payment,
    verify_payment,
};
use novare_core::{CurrencyCode, Email, OrderStatus, Role, Size, UserId};
use novare_integration_tests::{MemoryStore, StubGateway};

fn shopper(id: UserId, role: Role) -> CurrentUser {
    CurrentUser {
        id,
        username: format!("shopper{id}"),
        email: Email::parse(&format!("shopper{id}@novare.store")).unwrap(),
        role,
    }
}

/// A store holding one pending order of 2 × 100 + shipping for user 1.
async fn pending_order() -> (MemoryStore, Order) {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    store.add_to_cart(user, tee, 2, Size::Medium).await;

    let order = place_order(
        &store,
        user,
        PlaceOrderRequest {
            shipping_address: ShippingAddress {
                street: "3 Oxford St".to_owned(),
                city: "Accra".to_owned(),
                state: None,
                zip_code: None,
                country: "Ghana".to_owned(),
            },
            payment_method: None,
        },
    )
    .await
    .unwrap();
    (store, order)
}

#[tokio::test]
async fn test_initialize_charges_the_order_total() {
    let (store, order) = pending_order().await;
    let gateway = StubGateway::new();

    let authorization = initialize_payment(
        &gateway,
        &store,
        &shopper(order.user_id, Role::User),
        &InitializePaymentRequest {
            order_id: order.id,
            email: None,
        },
        CurrencyCode::NGN,
        Some("https://novare.store/payment/callback"),
    )
    .await
    .unwrap();

    assert_eq!(authorization.reference, format!("ref_{}", order.id));

    let opened = gateway.initialized().await;
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].amount, 21_500);
    assert_eq!(opened[0].email, "shopper1@novare.store");
    assert_eq!(opened[0].order_id, order.id);
}

#[tokio::test]
async fn test_initialize_rejects_other_shoppers() {
    let (store, order) = pending_order().await;
    let gateway = StubGateway::new();
    let request = InitializePaymentRequest {
        order_id: order.id,
        email: None,
    };

    let err = initialize_payment(
        &gateway,
        &store,
        &shopper(UserId::new(2), Role::User),
        &request,
        CurrencyCode::NGN,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PaymentError::Forbidden));

    // Admins may open a payment for anyone
    initialize_payment(
        &gateway,
        &store,
        &shopper(UserId::new(9), Role::Admin),
        &request,
        CurrencyCode::NGN,
        None,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_initialize_requires_pending_order() {
    let (store, order) = pending_order().await;
    store.set_status(order.id, OrderStatus::Shipped).await;

    let err = initialize_payment(
        &StubGateway::new(),
        &store,
        &shopper(order.user_id, Role::User),
        &InitializePaymentRequest {
            order_id: order.id,
            email: None,
        },
        CurrencyCode::NGN,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::NotPayable {
            status: OrderStatus::Shipped,
            ..
        }
    ));
}

#[tokio::test]
async fn test_repeated_verification_transitions_once() {
    let (store, order) = pending_order().await;
    let gateway = StubGateway::new();
    gateway
        .add_transaction("ref_ok", "success", Some(order.id), 21_500)
        .await;

    let first = verify_payment(&gateway, &store, "ref_ok").await.unwrap();
    let second = verify_payment(&gateway, &store, " ref_ok ").await.unwrap();

    assert_eq!(
        first,
        VerificationOutcome::Confirmed {
            order_id: order.id,
            transitioned: true
        }
    );
    assert_eq!(
        second,
        VerificationOutcome::Confirmed {
            order_id: order.id,
            transitioned: false
        }
    );
    assert_eq!(store.payment_transitions(order.id).await, 1);
    assert_eq!(gateway.verify_calls(), 2);

    let paid = store.orders().await.pop().unwrap();
    assert_eq!(paid.status, OrderStatus::Processing);
    assert!(paid.paid_at.is_some());
    let result = paid.payment_result.unwrap();
    assert_eq!(result.reference, "ref_ok");
    assert_eq!(result.status, "success");
}

#[tokio::test]
async fn test_declined_transaction_leaves_order_pending() {
    let (store, order) = pending_order().await;
    let gateway = StubGateway::new();
    gateway
        .add_transaction("ref_declined", "failed", Some(order.id), 21_500)
        .await;

    let outcome = verify_payment(&gateway, &store, "ref_declined")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        VerificationOutcome::Declined {
            order_id: Some(order.id),
            gateway_status: "failed".to_owned()
        }
    );
    let unpaid = store.orders().await.pop().unwrap();
    assert_eq!(unpaid.status, OrderStatus::Pending);
    assert_eq!(unpaid.payment_result, None);
    assert_eq!(store.payment_transitions(order.id).await, 0);
}

#[tokio::test]
async fn test_blank_reference_never_reaches_gateway() {
    let (store, _) = pending_order().await;
    let gateway = StubGateway::new();

    let err = verify_payment(&gateway, &store, "   ").await.unwrap_err();

    assert!(matches!(err, PaymentError::InvalidReference));
    assert_eq!(gateway.verify_calls(), 0);
}

#[tokio::test]
async fn test_unknown_reference_is_a_gateway_error() {
    let (store, order) = pending_order().await;
    let gateway = StubGateway::new();

    let err = verify_payment(&gateway, &store, "ref_missing")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Gateway(_)));
    assert_eq!(store.payment_transitions(order.id).await, 0);
}

#[tokio::test]
async fn test_success_without_order_reference_is_rejected() {
    let (store, _) = pending_order().await;
    let gateway = StubGateway::new();
    gateway.add_transaction("ref_orphan", "success", None, 100).await;

    let err = verify_payment(&gateway, &store, "ref_orphan")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::MissingOrderReference));
}
