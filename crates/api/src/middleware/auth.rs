//! Authentication extractors.
//!
//! Callers authenticate with `Authorization: Bearer <access token>`. The token
//! is checked first, then the user is reloaded so a deleted account or a
//! changed role takes effect immediately.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum::http::header::AUTHORIZATION;

use crate::db::users::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::auth::TokenKind;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in admin.
///
/// Unauthenticated callers get 401; signed-in non-admins get 403.
pub struct RequireAdmin(pub CurrentUser);

/// The bearer token from the `Authorization` header, if any.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let token = bearer_token(parts)
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_owned()))?;

    let user_id = state
        .tokens()
        .verify(TokenKind::Access, token)
        .and_then(|claims| claims.user_id())
        .map_err(|_| AppError::Unauthorized("Not authorized, token failed".to_owned()))?;

    let user = UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authorized, user not found".to_owned()))?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::Span::current().record("user_id", user.id.as_i32());

    Ok(CurrentUser::from(&user))
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Not authorized as an admin".to_owned()));
        }
        Ok(Self(user))
    }
}
