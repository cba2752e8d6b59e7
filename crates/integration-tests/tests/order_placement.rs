//! End-to-end order placement against the in-memory store.
//!
//! Run with: cargo test -p novare-integration-tests --test order_placement

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use rust_decimal::Decimal;

use novare_api::models::order::generate_order_number;
use novare_api::models::{NewOrder, ShippingAddress};
use novare_api::services::checkout::{
    CheckoutError, CheckoutStore, CommitError, PlaceOrderRequest, place_order,
};
use novare_core::checkout::{self, SHIPPING_PRICE};
use novare_core::{OrderStatus, Size, UserId};
use novare_integration_tests::MemoryStore;

fn request() -> PlaceOrderRequest {
    PlaceOrderRequest {
        shipping_address: ShippingAddress {
            street: "12 Admiralty Way".to_owned(),
            city: "Lagos".to_owned(),
            state: None,
            zip_code: None,
            country: "Nigeria".to_owned(),
        },
        payment_method: None,
    }
}

#[tokio::test]
async fn test_order_consumes_cart_and_stock() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    let cap = store.add_product(2, "Logo Cap", Decimal::new(4550, 2), 10).await;
    store.add_to_cart(user, tee, 1, Size::Small).await;
    store.add_to_cart(user, cap, 3, Size::Medium).await;
    store.add_to_cart(user, tee, 2, Size::Large).await;

    let order = place_order(&store, user, request()).await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, "paystack");
    assert_eq!(order.items.len(), 3);
    assert_eq!(order.items_price, Decimal::new(43650, 2));
    assert_eq!(order.total_price, order.items_price + SHIPPING_PRICE);
    assert!(order.order_number.starts_with("NV-"));

    assert_eq!(store.stock(tee).await, Some(2));
    assert_eq!(store.stock(cap).await, Some(7));
    assert!(store.cart(user).await.is_empty());
    assert_eq!(store.orders().await.len(), 1);
}

#[tokio::test]
async fn test_single_line_order_total() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let a = store.add_product(1, "A", Decimal::new(100, 0), 5).await;
    store.add_to_cart(user, a, 2, Size::Medium).await;

    let order = place_order(&store, user, request()).await.unwrap();

    assert_eq!(order.items_price, Decimal::new(200, 0));
    assert_eq!(order.total_price, Decimal::new(215, 0));
    assert_eq!(store.stock(a).await, Some(3));
    assert!(store.cart(user).await.is_empty());
}

#[tokio::test]
async fn test_short_line_fails_the_whole_order() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let a = store.add_product(1, "A", Decimal::new(100, 0), 5).await;
    let b = store.add_product(2, "B", Decimal::new(50, 0), 0).await;
    store.add_to_cart(user, a, 2, Size::Medium).await;
    store.add_to_cart(user, b, 1, Size::Medium).await;

    let err = place_order(&store, user, request()).await.unwrap_err();

    match err {
        CheckoutError::InsufficientStock { product_id, name } => {
            assert_eq!(product_id, b);
            assert_eq!(name, "B");
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(store.stock(a).await, Some(5));
    assert_eq!(store.stock(b).await, Some(0));
    assert_eq!(store.cart(user).await.len(), 2);
    assert!(store.orders().await.is_empty());
}

#[tokio::test]
async fn test_sizes_of_one_product_share_its_stock() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 3).await;
    store.add_to_cart(user, tee, 2, Size::Small).await;
    store.add_to_cart(user, tee, 2, Size::Large).await;

    let err = place_order(&store, user, request()).await.unwrap_err();

    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
    assert_eq!(store.stock(tee).await, Some(3));
    assert_eq!(store.cart(user).await.len(), 2);
}

#[tokio::test]
async fn test_price_change_does_not_touch_placed_order() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    store.add_to_cart(user, tee, 1, Size::Small).await;

    let placed = place_order(&store, user, request()).await.unwrap();
    store.set_price(tee, Decimal::new(999, 0)).await;

    let stored = store.orders().await.pop().unwrap();
    assert_eq!(stored.id, placed.id);
    assert_eq!(stored.items[0].price, Decimal::new(100, 0));
    assert_eq!(stored.total_price, placed.total_price);

    // A new order picks up the new price
    store.add_to_cart(user, tee, 1, Size::Small).await;
    let next = place_order(&store, user, request()).await.unwrap();
    assert_eq!(next.items[0].price, Decimal::new(999, 0));
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let store = MemoryStore::with_commit_gate(2);
    let alice = store.add_user(1).await;
    let bob = store.add_user(2).await;
    let tee = store.add_product(1, "Last Tee", Decimal::new(100, 0), 1).await;
    store.add_to_cart(alice, tee, 1, Size::Medium).await;
    store.add_to_cart(bob, tee, 1, Size::Medium).await;

    let (first, second) = tokio::join!(
        place_order(&store, alice, request()),
        place_order(&store, bob, request()),
    );

    let results = [first, second];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(CheckoutError::InsufficientStock { .. })))
        .count();
    assert_eq!(placed, 1);
    assert_eq!(short, 1);

    assert_eq!(store.stock(tee).await, Some(0));
    assert_eq!(store.orders().await.len(), 1);

    // The loser keeps their cart
    let carts = [store.cart(alice).await, store.cart(bob).await];
    assert_eq!(carts.iter().filter(|c| c.is_empty()).count(), 1);
}

#[tokio::test]
async fn test_double_submit_places_one_order() {
    let store = MemoryStore::with_commit_gate(2);
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    store.add_to_cart(user, tee, 2, Size::Medium).await;

    let (first, second) = tokio::join!(
        place_order(&store, user, request()),
        place_order(&store, user, request()),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::CartChanged)))
            .count(),
        1
    );
    assert_eq!(store.orders().await.len(), 1);
    assert_eq!(store.stock(tee).await, Some(3));
    assert!(store.cart(user).await.is_empty());
}

#[tokio::test]
async fn test_line_resized_after_planning_is_not_consumed() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    let line = store.add_to_cart(user, tee, 1, Size::Medium).await;

    let cart = store.load_cart(user).await.unwrap().unwrap();
    let plan = checkout::plan(&cart).unwrap();
    store.set_cart_quantity(user, line, 3).await;

    let err = store
        .commit_order(NewOrder {
            order_number: generate_order_number(Utc::now()),
            user_id: user,
            shipping_address: request().shipping_address,
            payment_method: "paystack".to_owned(),
            plan,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CommitError::CartChanged));
    assert_eq!(store.cart(user).await, vec![(tee, 3, Size::Medium)]);
    assert_eq!(store.stock(tee).await, Some(5));
    assert!(store.orders().await.is_empty());
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;

    let err = place_order(&store, user, request()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let store = MemoryStore::new();

    let err = place_order(&store, UserId::new(42), request())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::UserNotFound));
}

#[tokio::test]
async fn test_deleted_product_is_reported() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    store.add_to_cart(user, tee, 1, Size::Small).await;
    store.remove_product(tee).await;

    let err = place_order(&store, user, request()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::ProductNotFound(id) if id == tee));
    assert_eq!(store.cart(user).await.len(), 1);
}

#[tokio::test]
async fn test_blank_address_is_a_validation_error() {
    let store = MemoryStore::new();
    let user = store.add_user(1).await;
    let tee = store.add_product(1, "Box Tee", Decimal::new(100, 0), 5).await;
    store.add_to_cart(user, tee, 1, Size::Small).await;

    let mut blank = request();
    blank.shipping_address.city = "   ".to_owned();

    let err = place_order(&store, user, blank).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(_)));
    assert_eq!(store.stock(tee).await, Some(5));
}
