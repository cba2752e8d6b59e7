//! Order placement against `PostgreSQL`.
//!
//! Each test gets a fresh database with the migrations applied. They need a
//! server the `DATABASE_URL` role can create databases on:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/novare \
//!     cargo test -p novare-integration-tests --test checkout_postgres -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use sqlx::PgPool;

use novare_api::db::cart::MAX_LINE_QUANTITY;
use novare_api::db::{CartRepository, CheckoutRepository};
use novare_api::models::{NewOrder, ShippingAddress};
use novare_api::services::checkout::{
    CheckoutError, CheckoutStore, CommitError, PlaceOrderRequest, place_order,
};
use novare_core::checkout;
use novare_core::{ProductId, Size, UserId};

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

async fn insert_user(pool: &PgPool, name: &str) -> UserId {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO shop.user (username, email, phone_number, password_hash)
        VALUES ($1, $1 || '@novare.store', '+2348000000000', 'x')
        RETURNING id
        ",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    UserId::new(id)
}

async fn insert_product(pool: &PgPool, slug: &str, price: Decimal, stock: i32) -> ProductId {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO shop.product (name, slug, price, stock, category, sizes)
        VALUES ($1, $1, $2, $3, 'Tees', '{S,M,L}')
        RETURNING id
        ",
    )
    .bind(slug)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap();
    ProductId::new(id)
}

async fn stock(pool: &PgPool, id: ProductId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM shop.product WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM shop.{table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_order_is_committed_atomically(pool: PgPool) {
    let user = insert_user(&pool, "ada").await;
    let tee = insert_product(&pool, "box-tee", Decimal::new(100, 0), 5).await;
    let cart = CartRepository::new(&pool);
    cart.add(user, tee, Size::Small, 1).await.unwrap();
    cart.add(user, tee, Size::Large, 2).await.unwrap();

    let order = place_order(&CheckoutRepository::new(&pool), user, request())
        .await
        .unwrap();

    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_price, Decimal::new(315, 0));
    assert_eq!(stock(&pool, tee).await, 2);
    assert_eq!(count(&pool, "cart_line").await, 0);
    assert_eq!(count(&pool, "order").await, 1);
    assert_eq!(count(&pool, "order_item").await, 2);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_short_stock_rolls_back_everything(pool: PgPool) {
    let user = insert_user(&pool, "ada").await;
    let a = insert_product(&pool, "a", Decimal::new(100, 0), 5).await;
    let b = insert_product(&pool, "b", Decimal::new(50, 0), 1).await;
    let cart = CartRepository::new(&pool);
    cart.add(user, a, Size::Medium, 2).await.unwrap();
    cart.add(user, b, Size::Medium, 1).await.unwrap();

    // Drain b after the cart was planned against it
    let store = CheckoutRepository::new(&pool);
    let entries = store.load_cart(user).await.unwrap().unwrap();
    let plan = checkout::plan(&entries).unwrap();
    sqlx::query("UPDATE shop.product SET stock = 0 WHERE id = $1")
        .bind(b)
        .execute(&pool)
        .await
        .unwrap();

    let err = store
        .commit_order(NewOrder {
            order_number: "NV-20260301-AAAAAA".to_owned(),
            user_id: user,
            shipping_address: request().shipping_address,
            payment_method: "paystack".to_owned(),
            plan,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CommitError::InsufficientStock { product_id, .. } if product_id == b
    ));
    assert_eq!(stock(&pool, a).await, 5);
    assert_eq!(stock(&pool, b).await, 0);
    assert_eq!(count(&pool, "cart_line").await, 2);
    assert_eq!(count(&pool, "order").await, 0);
    assert_eq!(count(&pool, "order_item").await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_last_unit_goes_to_one_buyer(pool: PgPool) {
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;
    let tee = insert_product(&pool, "last-tee", Decimal::new(100, 0), 1).await;
    let cart = CartRepository::new(&pool);
    cart.add(alice, tee, Size::Medium, 1).await.unwrap();
    cart.add(bob, tee, Size::Medium, 1).await.unwrap();

    let store = CheckoutRepository::new(&pool);
    let (first, second) = tokio::join!(
        place_order(&store, alice, request()),
        place_order(&store, bob, request()),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::InsufficientStock { .. })))
            .count(),
        1
    );
    assert_eq!(stock(&pool, tee).await, 0);
    assert_eq!(count(&pool, "order").await, 1);
    assert_eq!(count(&pool, "cart_line").await, 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_double_submit_places_one_order(pool: PgPool) {
    let user = insert_user(&pool, "ada").await;
    let tee = insert_product(&pool, "box-tee", Decimal::new(100, 0), 5).await;
    CartRepository::new(&pool)
        .add(user, tee, Size::Medium, 2)
        .await
        .unwrap();

    let store = CheckoutRepository::new(&pool);
    let (first, second) = tokio::join!(
        place_order(&store, user, request()),
        place_order(&store, user, request()),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    // The loser either saw the lines taken under lock or an already empty cart
    assert!(results.iter().any(|r| matches!(
        r,
        Err(CheckoutError::CartChanged | CheckoutError::EmptyCart)
    )));
    assert_eq!(stock(&pool, tee).await, 3);
    assert_eq!(count(&pool, "order").await, 1);
    assert_eq!(count(&pool, "cart_line").await, 0);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_repeated_adds_saturate_line_quantity(pool: PgPool) {
    let user = insert_user(&pool, "ada").await;
    let tee = insert_product(&pool, "box-tee", Decimal::new(100, 0), 5).await;
    let cart = CartRepository::new(&pool);
    for _ in 0..3 {
        cart.add(user, tee, Size::Medium, MAX_LINE_QUANTITY)
            .await
            .unwrap();
    }

    let lines = cart.list(user).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
}
