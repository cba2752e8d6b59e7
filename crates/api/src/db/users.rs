//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use novare_core::{Email, Role, UserId};

use super::{RepositoryError, conflict_on_unique, parse_email};
use crate::models::user::{AccountUpdate, ProfileUpdate, SavedAddress, User};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    phone_number: String,
    role: Role,
    avatar: Option<String>,
    shipping_address: Option<Json<SavedAddress>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            email: parse_email(&row.email)?,
            phone_number: row.phone_number,
            role: row.role,
            avatar: row.avatar,
            shipping_address: row.shipping_address.map(|Json(address)| address),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, phone_number, role, avatar, shipping_address,
                   created_at, updated_at
            FROM shop.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, phone_number, role, avatar, shipping_address,
                   created_at, updated_at
            FROM shop.user
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    /// Get a user and their password hash by email or username.
    ///
    /// The login is compared case-insensitively against the email and exactly
    /// against the username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        login: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(
            r"
            SELECT id, username, email, phone_number, role, avatar, shipping_address,
                   created_at, updated_at, password_hash
            FROM shop.user
            WHERE email = LOWER($1) OR username = $1
            ORDER BY (email = LOWER($1)) DESC
            LIMIT 1
            ",
        )
        .bind(login.trim())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// List all users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, phone_number, role, avatar, shipping_address,
                   created_at, updated_at
            FROM shop.user
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    /// Create a new user with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &str,
        email: &Email,
        phone_number: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user (username, email, phone_number, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, phone_number, role, avatar, shipping_address,
                      created_at, updated_at
            ",
        )
        .bind(username)
        .bind(email)
        .bind(phone_number)
        .bind(password_hash)
        .bind(role)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username or email"))?;

        row.try_into()
    }

    /// Get the user linked to a Google account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_google_id(&self, google_id: &str) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, email, phone_number, role, avatar, shipping_address,
                   created_at, updated_at
            FROM shop.user
            WHERE google_id = $1
            ",
        )
        .bind(google_id)
        .fetch_optional(self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    /// Link a Google account to the user with this email, unless that user
    /// is already linked to one. Returns the linked user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn link_google(
        &self,
        email: &Email,
        google_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET google_id = $2
            WHERE email = $1 AND google_id IS NULL
            RETURNING id, username, email, phone_number, role, avatar, shipping_address,
                      created_at, updated_at
            ",
        )
        .bind(email)
        .bind(google_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "google account"))?
        .map(User::try_from)
        .transpose()
    }

    /// Create a shopper account for a Google sign-in.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username, email or Google
    /// account is already taken.
    pub async fn create_google(
        &self,
        username: &str,
        email: &Email,
        google_id: &str,
        password_hash: &str,
        avatar: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO shop.user
                (username, email, phone_number, password_hash, google_id, avatar)
            VALUES ($1, $2, '', $3, $4, $5)
            RETURNING id, username, email, phone_number, role, avatar, shipping_address,
                      created_at, updated_at
            ",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(google_id)
        .bind(avatar)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username, email or google account"))?;

        row.try_into()
    }

    /// Apply a self-service profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new username or email is taken.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                phone_number = COALESCE($4, phone_number),
                shipping_address = COALESCE($5, shipping_address)
            WHERE id = $1
            RETURNING id, username, email, phone_number, role, avatar, shipping_address,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(update.username.as_deref())
        .bind(update.email.as_ref())
        .bind(update.phone_number.as_deref())
        .bind(update.shipping_address.as_ref().map(Json))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username or email"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Apply an admin account update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new username or email is taken.
    pub async fn update_account(
        &self,
        id: UserId,
        update: &AccountUpdate,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                phone_number = COALESCE($4, phone_number),
                role = COALESCE($5, role)
            WHERE id = $1
            RETURNING id, username, email, phone_number, role, avatar, shipping_address,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(update.username.as_deref())
        .bind(update.email.as_ref())
        .bind(update.phone_number.as_deref())
        .bind(update.role)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username or email"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Set a user's role by email. Returns the updated user, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_role(&self, email: &Email, role: Role) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, UserRow>(
            r"
            UPDATE shop.user
            SET role = $2
            WHERE email = $1
            RETURNING id, username, email, phone_number, role, avatar, shipping_address,
                      created_at, updated_at
            ",
        )
        .bind(email)
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    /// Delete a user.
    ///
    /// Cart lines, wishlist items and reviews go with the account. Orders are
    /// kept, so a user with order history cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the user has placed orders.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict("user has placed orders".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Token Hashes
    // =========================================================================

    /// Store (or clear, with `None`) the hash of the user's refresh token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_refresh_token_hash(
        &self,
        id: UserId,
        hash: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.user SET refresh_token_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Get the stored refresh token hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_refresh_token_hash(
        &self,
        id: UserId,
    ) -> Result<Option<String>, RepositoryError> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT refresh_token_hash FROM shop.user WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(hash.flatten())
    }

    /// Clear the refresh token of whichever user holds `hash`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_refresh_token_by_hash(&self, hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user SET refresh_token_hash = NULL WHERE refresh_token_hash = $1",
        )
        .bind(hash)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a password reset token hash and its expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_password_reset(
        &self,
        id: UserId,
        token_hash: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE shop.user
            SET password_reset_token_hash = $2, password_reset_expires_at = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Replace the password of the user holding an unexpired reset token.
    ///
    /// Consumes the token and signs the user out everywhere by clearing the
    /// refresh token. Returns the user id, or `None` if no unexpired token
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE shop.user
            SET password_hash = $2,
                password_reset_token_hash = NULL,
                password_reset_expires_at = NULL,
                refresh_token_hash = NULL
            WHERE password_reset_token_hash = $1
              AND password_reset_expires_at > $3
            RETURNING id
            ",
        )
        .bind(token_hash)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }
}
