//! Account management.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use novare_core::{Email, Role, UserId};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::extract::{AppJson, AppPath};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::models::user::AccountUpdate;
use crate::routes::{Done, Envelope, done, missing, ok};
use crate::state::AppState;

/// Account changes. Absent or blank fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl TryFrom<AccountRequest> for AccountUpdate {
    type Error = AppError;

    fn try_from(request: AccountRequest) -> Result<Self> {
        let email = non_blank(request.email)
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(Self {
            username: non_blank(request.username),
            email,
            phone_number: non_blank(request.phone_number),
            role: request.role,
        })
    }
}

/// All accounts.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<User>>>> {
    let users = UserRepository::new(state.pool()).list().await?;
    Ok(ok(users))
}

/// One account.
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<UserId>,
) -> Result<Json<Envelope<User>>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_owned()))?;
    Ok(ok(user))
}

/// Edit an account's contact details or role.
#[instrument(skip(state, request), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<UserId>,
    AppJson(request): AppJson<AccountRequest>,
) -> Result<Json<Envelope<User>>> {
    let update = AccountUpdate::try_from(request)?;
    let user = UserRepository::new(state.pool())
        .update_account(id, &update)
        .await
        .map_err(missing("User"))?;

    tracing::info!(user_id = %user.id, role = %user.role, "Account updated");
    Ok(ok(user))
}

/// Delete an account that has no orders.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<UserId>,
) -> Result<Json<Done>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "Admins cannot delete their own account".to_owned(),
        ));
    }

    UserRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(missing("User"))?;

    tracing::info!(user_id = %id, "Account deleted");
    Ok(done("User removed"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_ignored() {
        let update = AccountUpdate::try_from(AccountRequest {
            username: Some("  ".to_owned()),
            email: Some(String::new()),
            phone_number: Some(" 0800 ".to_owned()),
            role: Some(Role::Admin),
        })
        .unwrap();

        assert_eq!(update.username, None);
        assert_eq!(update.email, None);
        assert_eq!(update.phone_number.as_deref(), Some("0800"));
        assert_eq!(update.role, Some(Role::Admin));
    }

    #[test]
    fn test_invalid_email_rejected() {
        let result = AccountUpdate::try_from(AccountRequest {
            email: Some("not-an-email".to_owned()),
            ..AccountRequest::default()
        });
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
