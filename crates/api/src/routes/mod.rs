//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database readiness
//!
//! # Auth (register/login/refresh/password reset are rate limited)
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/refresh
//! POST /api/auth/logout
//! POST /api/auth/forgot-password
//! PUT  /api/auth/reset-password/{token}
//! GET  /api/auth/me
//! PATCH /api/auth/profile
//! GET  /api/auth/google                 - Redirect to Google consent
//! GET  /api/auth/google/callback        - Google redirect (public)
//!
//! # Catalog (public)
//! GET  /api/products                    - ?category&search&featured&page&limit
//! GET  /api/products/lookbook
//! GET  /api/products/{slug}
//! GET  /api/lookbook
//! GET  /api/lookbook/{slug}
//! GET  /api/reviews/{productId}
//!
//! # Shopper (bearer token)
//! GET|POST|DELETE  /api/cart
//! PUT|DELETE       /api/cart/{lineId}
//! GET|POST         /api/wishlist
//! DELETE           /api/wishlist/{productId}
//! POST /api/orders                      - Place order from cart
//! GET  /api/orders/myorders
//! GET  /api/orders/{id}                 - Owner or admin
//! POST /api/payments/paystack/initialize
//! GET  /api/payments/paystack/verify    - Gateway redirect (public)
//! POST /api/reviews/{productId}
//! PUT|DELETE /api/reviews/{reviewId}
//!
//! # Admin
//! GET  /api/orders
//! PUT  /api/orders/{id}/status
//! /api/admin/users, /api/admin/products, /api/admin/lookbooks
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod health;
pub mod lookbook;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn,
    routing::{delete, get, patch, post, put},
};
use serde::Serialize;

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter, rate_limit_response_middleware};
use crate::state::AppState;

/// Successful response body: `{success: true, data}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap a payload in a 200 envelope.
pub const fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

/// Wrap a payload in a 201 envelope.
pub const fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(data))
}

/// Empty success body.
#[derive(Debug, Serialize)]
pub struct Done {
    pub success: bool,
    pub message: &'static str,
}

/// `{success: true, message}`.
pub const fn done(message: &'static str) -> Json<Done> {
    Json(Done {
        success: true,
        message,
    })
}

/// Name the missing entity when a repository reports `NotFound`.
fn missing(what: &'static str) -> impl FnOnce(RepositoryError) -> AppError {
    move |e| match e {
        RepositoryError::NotFound => AppError::NotFound(format!("{what} not found")),
        other => other.into(),
    }
}

/// Create the auth routes router.
fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", put(auth::reset_password))
        .layer(auth_rate_limiter())
        .layer(from_fn(rate_limit_response_middleware));

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
        .route("/google", get(auth::google))
        .route("/google/callback", get(auth::google_callback))
        .route("/me", get(auth::me))
        .route("/profile", patch(auth::update_profile))
}

/// Create the product routes router.
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/lookbook", get(products::lookbook))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{line_id}", put(cart::update).delete(cart::remove))
}

/// Create the wishlist routes router.
fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index).post(wishlist::add))
        .route("/{product_id}", delete(wishlist::remove))
}

/// Create the order routes router.
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::place).get(orders::index))
        .route("/myorders", get(orders::mine))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
}

/// Create the payment routes router.
fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/paystack/initialize", post(payments::initialize))
        .route("/paystack/verify", get(payments::verify))
}

/// Create the review routes router.
///
/// `GET`/`POST` take a product id, `PUT`/`DELETE` a review id.
fn review_routes() -> Router<AppState> {
    Router::new().route(
        "/{id}",
        get(reviews::index)
            .post(reviews::create)
            .put(reviews::update)
            .delete(reviews::destroy),
    )
}

/// Create the lookbook routes router.
fn lookbook_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(lookbook::index))
        .route("/{slug}", get(lookbook::show))
}

/// Create the admin routes router.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::users::index))
        .route(
            "/users/{id}",
            get(admin::users::show)
                .put(admin::users::update)
                .delete(admin::users::destroy),
        )
        .route(
            "/products",
            get(admin::products::index).post(admin::products::create),
        )
        .route(
            "/products/{id}",
            get(admin::products::show)
                .put(admin::products::update)
                .delete(admin::products::destroy),
        )
        .route(
            "/lookbooks",
            get(admin::lookbooks::index).post(admin::lookbooks::create),
        )
        .route(
            "/lookbooks/{id}",
            put(admin::lookbooks::update).delete(admin::lookbooks::destroy),
        )
        .layer(DefaultBodyLimit::max(admin::form::MAX_UPLOAD_BYTES))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    // Writes by signed-in shoppers share one per-IP budget
    let shopper = Router::new()
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
        .nest("/reviews", review_routes())
        .layer(api_rate_limiter())
        .layer(from_fn(rate_limit_response_middleware));

    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/lookbook", lookbook_routes())
        .nest("/admin", admin_routes())
        .merge(shopper);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
}
