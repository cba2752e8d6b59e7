//! Authentication service.
//!
//! Password and Google sign-in with JWT access/refresh tokens, profile
//! updates and e-mailed password reset.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{Claims, TokenKind, TokenPair, TokenService};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use novare_core::{Email, Role, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;
use crate::models::user::{ProfileUpdate, SavedAddress};
use crate::services::email::EmailService;
use crate::services::google::GoogleProfile;
use tokens::hash_token;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length.
const MAX_PASSWORD_LENGTH: usize = 128;

/// How long a password reset link stays valid.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Random bytes in a password reset token.
const RESET_TOKEN_BYTES: usize = 20;

/// Longest username derived from a Google profile, before the suffix.
const GOOGLE_USERNAME_STEM: usize = 20;

/// Registration form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
}

/// Profile changes submitted by the user. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub shipping_address: Option<SavedAddress>,
}

/// A signed-in user with fresh tokens.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenService) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens,
        }
    }

    /// Issue tokens for a user and remember the refresh token's hash.
    async fn start_session(&self, user: User) -> Result<Session, AuthError> {
        let tokens = self.tokens.issue_pair(user.id, user.role)?;
        self.users
            .set_refresh_token_hash(user.id, Some(&hash_token(&tokens.refresh_token)))
            .await?;
        Ok(Session { user, tokens })
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new shopper and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username or email is taken.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<Session, AuthError> {
        let username = required(&request.username, "username")?;
        let phone_number = required(&request.phone_number, "phone number")?;
        let email = Email::parse(&request.email)?;
        validate_password(&request.password)?;

        let password_hash = hash_password(&request.password)?;

        let user = self
            .users
            .create(&username, &email, &phone_number, &password_hash, Role::User)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.start_session(user).await
    }

    /// Login with an email or username and a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the login or password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<Session, AuthError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let (user, password_hash) = self
            .users
            .get_with_password_hash(login)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        self.start_session(user).await
    }

    /// Sign in with a verified Google account.
    ///
    /// The account is found by its Google id, then by e-mail (linking the
    /// two), and otherwise created as a shopper with an unusable password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if Google has not verified the e-mail.
    /// Returns `AuthError::UserAlreadyExists` if a concurrent sign-up took the
    /// generated username or the e-mail.
    #[instrument(skip(self, profile))]
    pub async fn google_sign_in(&self, profile: &GoogleProfile) -> Result<Session, AuthError> {
        if !profile.email_verified {
            return Err(AuthError::Validation(
                "Google account e-mail is not verified".to_owned(),
            ));
        }

        if let Some(user) = self.users.get_by_google_id(&profile.subject).await? {
            return self.start_session(user).await;
        }

        let email = Email::parse(&profile.email)?;
        if let Some(user) = self.users.link_google(&email, &profile.subject).await? {
            tracing::info!(user_id = %user.id, "Google account linked");
            return self.start_session(user).await;
        }

        let username = google_username(profile, &generate_reset_token()[..6]);
        let password_hash = hash_password(&generate_reset_token())?;
        let user = self
            .users
            .create_google(
                &username,
                &email,
                &profile.subject,
                &password_hash,
                profile.picture.as_deref(),
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered with Google");
        self.start_session(user).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token must still be the one stored for the user; it is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is invalid, expired or
    /// has been revoked by logout or password reset.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.verify(TokenKind::Refresh, refresh_token)?;
        let user_id = claims.user_id()?;

        let stored = self.users.get_refresh_token_hash(user_id).await?;
        if stored.as_deref() != Some(hash_token(refresh_token).as_str()) {
            return Err(AuthError::InvalidToken);
        }

        // Role comes from the database so a demotion takes effect on refresh.
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(TokenPair {
            access_token: self.tokens.issue(TokenKind::Access, user.id, user.role)?,
            refresh_token: refresh_token.to_owned(),
        })
    }

    /// Revoke a refresh token. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self
            .users
            .clear_refresh_token_by_hash(&hash_token(refresh_token))
            .await?
        {
            tracing::info!("User logged out");
        }
        Ok(())
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply a profile update.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` or `AuthError::InvalidEmail` for
    /// malformed fields and `AuthError::UserAlreadyExists` if the new
    /// username or email is taken.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: ProfileRequest,
    ) -> Result<User, AuthError> {
        let update = ProfileUpdate {
            username: request
                .username
                .map(|u| required(&u, "username"))
                .transpose()?,
            email: request.email.map(|e| Email::parse(&e)).transpose()?,
            phone_number: request
                .phone_number
                .map(|p| required(&p, "phone number"))
                .transpose()?,
            shipping_address: request.shipping_address,
        };

        self.users
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// E-mail a password reset link to a registered address.
    ///
    /// The token is stored hashed; if the e-mail cannot be sent it is cleared
    /// again.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account uses the address.
    /// Returns `AuthError::EmailUnavailable` if SMTP is not configured.
    /// Returns `AuthError::Email` if sending fails.
    #[instrument(skip(self, email, client_url, mailer))]
    pub async fn forgot_password(
        &self,
        email: &str,
        client_url: &str,
        mailer: Option<&EmailService>,
    ) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let mailer = mailer.ok_or(AuthError::EmailUnavailable)?;

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.users
            .set_password_reset(user.id, Some(&hash_token(&token)), Some(expires_at))
            .await?;

        let reset_url = format!("{client_url}/reset-password/{token}");
        if let Err(e) = mailer
            .send_password_reset(
                user.email.as_str(),
                &user.username,
                &reset_url,
                RESET_TOKEN_TTL_MINUTES,
            )
            .await
        {
            self.users.set_password_reset(user.id, None, None).await?;
            return Err(e.into());
        }

        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    /// Set a new password using a reset token.
    ///
    /// Also signs the user out everywhere by clearing the refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown or expired.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user_id = self
            .users
            .reset_password(&hash_token(token.trim()), &password_hash, Utc::now())
            .await?
            .ok_or(AuthError::InvalidToken)?;

        tracing::info!(user_id = %user_id, "Password reset");
        Ok(())
    }
}

/// Trim a required text field.
fn required(value: &str, field: &str) -> Result<String, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::Validation(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

/// Check a new password against the length rules.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the violated rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// A username for a new Google account: the display name (or the e-mail's
/// local part) reduced to lowercase ASCII letters and digits, plus `suffix`.
fn google_username(profile: &GoogleProfile, suffix: &str) -> String {
    let source = profile
        .name
        .as_deref()
        .filter(|name| name.chars().any(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| profile.email.split('@').next().unwrap_or_default());

    let stem: String = source
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(GOOGLE_USERNAME_STEM)
        .collect();

    if stem.is_empty() {
        format!("shopper{suffix}")
    } else {
        format!("{stem}{suffix}")
    }
}

/// A random hex token for a password reset link.
fn generate_reset_token() -> String {
    let mut bytes = [0_u8; RESET_TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_rules() {
        assert!(matches!(
            validate_password("12345"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("battery staple", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_reset_token_format() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
    }

    fn google_profile(name: Option<&str>, email: &str) -> GoogleProfile {
        GoogleProfile {
            subject: "110248495921238986420".to_owned(),
            email: email.to_owned(),
            email_verified: true,
            name: name.map(str::to_owned),
            picture: None,
        }
    }

    #[test]
    fn test_google_username_from_display_name() {
        let profile = google_profile(Some("Adaeze O'Brien-Obi"), "ada@gmail.com");
        assert_eq!(google_username(&profile, "3f9a0c"), "adaezeobrienobi3f9a0c");
    }

    #[test]
    fn test_google_username_falls_back_to_email() {
        let profile = google_profile(Some("张伟"), "zhang.wei@gmail.com");
        assert_eq!(google_username(&profile, "01"), "zhangwei01");

        let profile = google_profile(None, "__@gmail.com");
        assert_eq!(google_username(&profile, "01"), "shopper01");
    }

    #[test]
    fn test_google_username_is_bounded() {
        let long = "x".repeat(80);
        let profile = google_profile(Some(&long), "x@gmail.com");
        assert_eq!(
            google_username(&profile, "ab").len(),
            GOOGLE_USERNAME_STEM + 2
        );
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  ada ", "username").unwrap(), "ada");
        assert!(matches!(
            required("   ", "username"),
            Err(AuthError::Validation(_))
        ));
    }
}
