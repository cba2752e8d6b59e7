//! Admin account commands.
//!
//! The API never lets a shopper grant themselves the admin role, so the first
//! admin is created here.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account
//! novare admin create -u ops -e ops@novare.store -p "+233200000000" --password '...'
//!
//! # Promote an existing account
//! novare admin promote someone@example.com
//! ```

use novare_api::db::{RepositoryError, UserRepository};
use novare_api::services::auth::{AuthError, hash_password, validate_password};
use novare_core::{Email, Role};
use thiserror::Error;

use super::{DATABASE_URL_VAR, connect, database_url};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository error.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Missing username or phone number.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Password too short or too long, or hashing failed.
    #[error("Password rejected: {0}")]
    Password(#[from] AuthError),

    /// An account already uses this username or email.
    #[error("An account already exists for: {0}")]
    UserExists(String),

    /// No account with this email.
    #[error("No account with email: {0}")]
    UserNotFound(String),
}

fn parse_email(email: &str) -> Result<Email, AdminError> {
    Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))
}

/// Create a new admin account.
///
/// # Returns
///
/// The ID of the created account.
///
/// # Errors
///
/// Returns an error if the input is invalid, the account already exists or
/// the database fails.
pub async fn create_user(
    username: &str,
    email: &str,
    phone: &str,
    password: &str,
) -> Result<i32, AdminError> {
    let email = parse_email(email)?;
    let username = username.trim();
    if username.is_empty() {
        return Err(AdminError::MissingField("username"));
    }
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(AdminError::MissingField("phone number"));
    }
    validate_password(password)?;

    let database_url = database_url().ok_or(AdminError::MissingEnvVar(DATABASE_URL_VAR))?;
    let pool = connect(&database_url).await?;

    tracing::info!("Creating admin account: {} ({})", username, email);

    let password_hash = hash_password(password)?;
    let user = UserRepository::new(&pool)
        .create(username, &email, phone, &password_hash, Role::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Admin account created successfully! ID: {}, Username: {}, Email: {}",
        user.id,
        user.username,
        email
    );
    tracing::warn!("Ask the new admin to change this password after first login.");

    Ok(user.id.as_i32())
}

/// Grant the admin role to an existing account.
///
/// # Errors
///
/// Returns an error if the email is invalid, no account uses it or the
/// database fails.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = parse_email(email)?;

    let database_url = database_url().ok_or(AdminError::MissingEnvVar(DATABASE_URL_VAR))?;
    let pool = connect(&database_url).await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, Role::Admin)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    tracing::info!("Promoted {} ({}) to admin", user.username, email);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_bad_input_before_connecting() {
        let err = create_user("ops", "not-an-email", "+233", "long-enough-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidEmail(_)));

        let err = create_user("  ", "ops@novare.store", "+233", "long-enough-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::MissingField("username")));

        let err = create_user("ops", "ops@novare.store", "+233", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Password(AuthError::WeakPassword(_))));
    }
}
