//! Authentication route handlers.
//!
//! Tokens travel in JSON bodies: `accessToken` is sent back as a bearer
//! header, `refreshToken` is presented to `/refresh` and `/logout`. Google
//! sign-in ends in a redirect to the storefront carrying both tokens in the
//! URL fragment.

use axum::{Json, extract::State, http::StatusCode, response::Redirect};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::routes::{Done, Envelope, created, done, ok};
use crate::services::auth::{
    AuthError, AuthService, ProfileRequest, RegisterRequest, Session, TokenPair,
};
use crate::services::google::GoogleClient;
use crate::state::AppState;

/// A signed-in user and their tokens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user: session.user,
            tokens: session.tokens,
        }
    }
}

/// Login form. `login` is an e-mail address or a username.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub login: String,
    pub password: String,
}

/// Body carrying a refresh token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Forgot-password form.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password form.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Query string Google appends to the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Register a new account.
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<SessionResponse>>)> {
    let session = AuthService::new(state.pool(), state.tokens())
        .register(request)
        .await?;
    Ok(created(session.into()))
}

/// Sign in with a password.
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<Envelope<SessionResponse>>> {
    let session = AuthService::new(state.pool(), state.tokens())
        .login(&request.login, &request.password)
        .await?;
    Ok(ok(session.into()))
}

/// Exchange a refresh token for a new access token.
#[instrument(skip(state, request))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> Result<Json<Envelope<TokenPair>>> {
    let tokens = AuthService::new(state.pool(), state.tokens())
        .refresh(&request.refresh_token)
        .await?;
    Ok(ok(tokens))
}

/// Revoke a refresh token.
#[instrument(skip(state, request))]
pub async fn logout(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> Result<Json<Done>> {
    AuthService::new(state.pool(), state.tokens())
        .logout(&request.refresh_token)
        .await?;
    Ok(done("Logged out"))
}

/// The signed-in user's profile.
pub async fn me(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Envelope<User>>> {
    let user = AuthService::new(state.pool(), state.tokens())
        .get_user(user.id)
        .await?;
    Ok(ok(user))
}

/// Update the signed-in user's profile.
#[instrument(skip(state, request), fields(user_id = %user.id))]
pub async fn update_profile(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppJson(request): AppJson<ProfileRequest>,
) -> Result<Json<Envelope<User>>> {
    let user = AuthService::new(state.pool(), state.tokens())
        .update_profile(user.id, request)
        .await?;
    Ok(ok(user))
}

/// E-mail a password reset link.
#[instrument(skip(state, request))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(request): AppJson<ForgotPasswordRequest>,
) -> Result<Json<Done>> {
    AuthService::new(state.pool(), state.tokens())
        .forgot_password(&request.email, &state.config().client_url, state.email())
        .await?;
    Ok(done("Password reset e-mail sent"))
}

/// Set a new password with a reset token.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
    AppJson(request): AppJson<ResetPasswordRequest>,
) -> Result<Json<Done>> {
    AuthService::new(state.pool(), state.tokens())
        .reset_password(&token, &request.password)
        .await?;
    Ok(done("Password has been reset"))
}

fn google_client(state: &AppState) -> Result<&GoogleClient> {
    state
        .google()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_owned()))
}

/// Send the shopper to Google's consent screen.
pub async fn google(State(state): State<AppState>) -> Result<Redirect> {
    let google = google_client(&state)?;
    Ok(Redirect::to(&google.authorization_url().await))
}

/// Google redirect target: sign the account in, then send the shopper back to
/// the storefront with their tokens or an error code.
#[instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<GoogleCallbackQuery>,
) -> Result<Redirect> {
    let google = google_client(&state)?;
    let client_url = &state.config().client_url;

    let target = match complete_google_sign_in(&state, google, query).await {
        Ok(session) => session_redirect(client_url, &session.tokens),
        Err(reason) => format!("{client_url}/login?error={reason}"),
    };
    Ok(Redirect::to(&target))
}

/// Run the callback; failures are reduced to the code shown to the shopper.
async fn complete_google_sign_in(
    state: &AppState,
    google: &GoogleClient,
    query: GoogleCallbackQuery,
) -> std::result::Result<Session, &'static str> {
    if let Some(error) = query.error {
        tracing::info!(error = %error, "Google sign-in declined");
        return Err("google_denied");
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err("google_failed");
    };
    if !google.take_state(&oauth_state).await {
        tracing::warn!("Unknown or expired Google OAuth state");
        return Err("google_invalid_state");
    }

    let profile = google.exchange_code(&code).await.map_err(|e| {
        tracing::error!(error = %e, "Google code exchange failed");
        "google_failed"
    })?;

    AuthService::new(state.pool(), state.tokens())
        .google_sign_in(&profile)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Google sign-in failed");
            match e {
                AuthError::Validation(_) => "google_unverified",
                AuthError::UserAlreadyExists => "google_conflict",
                _ => "google_failed",
            }
        })
}

/// Storefront landing URL carrying the tokens in the fragment, which browsers
/// never send to a server.
fn session_redirect(client_url: &str, tokens: &TokenPair) -> String {
    let fragment = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("accessToken", &tokens.access_token)
        .append_pair("refreshToken", &tokens.refresh_token)
        .finish();
    format!("{client_url}/auth/google/callback#{fragment}")
}
