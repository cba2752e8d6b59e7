//! Database operations for the store `PostgreSQL`.
//!
//! # Schema: `shop`
//!
//! ## Tables
//!
//! - `user` - Accounts, refresh token hash, password reset token hash
//! - `product` - Catalog, including the authoritative `stock` count
//! - `cart_line` - One row per (user, product, size)
//! - `wishlist_item` - Saved products
//! - `order` / `order_item` - Placed orders and their snapshotted line items
//! - `review` - One review per user per product
//! - `lookbook` - Gallery looks; products point at their look
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p novare-cli -- migrate
//! ```

pub mod cart;
pub mod checkout;
pub mod lookbooks;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use checkout::CheckoutRepository;
pub use lookbooks::LookbookRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
///
/// `what` names the duplicated value for the error message.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Parse a stored size label.
pub(crate) fn parse_size(label: &str) -> Result<novare_core::Size, RepositoryError> {
    label
        .parse()
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid size in database: {e}")))
}

/// Parse a stored e-mail address.
pub(crate) fn parse_email(email: &str) -> Result<novare_core::Email, RepositoryError> {
    novare_core::Email::parse(email)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}
