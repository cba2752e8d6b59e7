//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;

/// Environment variable holding the store database URL.
pub const DATABASE_URL_VAR: &str = "NOVARE_DATABASE_URL";

/// Read the database URL, falling back to the generic `DATABASE_URL`.
pub fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();

    std::env::var(DATABASE_URL_VAR)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Open a connection pool for a one-shot command.
///
/// # Errors
///
/// Returns the connection error.
pub async fn connect(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Connecting to database...");
    novare_api::db::create_pool(database_url).await
}
