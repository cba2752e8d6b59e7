//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use novare_core::{Email, Role, UserId};

/// A registered account (domain type).
///
/// Never carries the password hash or token hashes; those stay in the
/// repository layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub phone_number: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub shipping_address: Option<SavedAddress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The default shipping address saved on a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Changes a user may make to their own profile.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<Email>,
    pub phone_number: Option<String>,
    pub shipping_address: Option<SavedAddress>,
}

/// Changes an admin may make to any account.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub email: Option<Email>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
}

/// The authenticated caller, resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Whether the caller may act on a resource owned by `owner`.
    #[must_use]
    pub fn can_access(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn caller(id: i32, role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            username: "ada".to_owned(),
            email: Email::parse("ada@example.com").unwrap(),
            role,
        }
    }

    #[test]
    fn test_owner_can_access() {
        assert!(caller(1, Role::User).can_access(UserId::new(1)));
        assert!(!caller(1, Role::User).can_access(UserId::new(2)));
    }

    #[test]
    fn test_admin_can_access_anything() {
        assert!(caller(1, Role::Admin).can_access(UserId::new(2)));
    }
}
