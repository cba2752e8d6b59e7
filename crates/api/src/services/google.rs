//! Google sign-in over OAuth 2.0 / OpenID Connect.
//!
//! The flow is the usual authorization-code dance:
//!
//! 1. [`GoogleClient::authorization_url`] mints a one-time `state`, keeps it
//!    in memory for ten minutes and returns the consent screen URL.
//! 2. Google redirects back with `code` and `state`;
//!    [`GoogleClient::take_state`] consumes the state.
//! 3. [`GoogleClient::exchange_code`] trades the code for an access token and
//!    reads the account's profile from the userinfo endpoint.
//!
//! Pending states live in process memory, so a callback must reach the
//! instance that started the flow.

use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &[&str] = &["openid", "email", "profile"];

/// How long a started sign-in may take.
const STATE_TTL: Duration = Duration::from_secs(600);

/// Outbound request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors talking to Google.
#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),
}

/// The Google account that signed in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleProfile {
    /// Stable account id (`sub`).
    #[serde(rename = "sub")]
    pub subject: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    callback_url: String,
    pending: Cache<String, ()>,
}

impl GoogleClient {
    /// Create a new Google client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GoogleConfig) -> Result<Self, GoogleError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            pending: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(STATE_TTL)
                .build(),
        })
    }

    /// Start a sign-in: remember a fresh `state` and return the consent URL.
    pub async fn authorization_url(&self) -> String {
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.pending.insert(state.clone(), ()).await;
        consent_url(&self.client_id, &self.callback_url, &state)
    }

    /// Consume a `state` returned by Google. Each state is accepted once.
    pub async fn take_state(&self, state: &str) -> bool {
        self.pending.remove(state).await.is_some()
    }

    /// Exchange an authorization code for the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::Api` if Google rejects the code or token, and
    /// `GoogleError::Http`/`GoogleError::Parse` for transport failures.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("redirect_uri", self.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token: TokenResponse = read(response).await?;

        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        read(response).await
    }
}

async fn read<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GoogleError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GoogleError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| GoogleError::Parse(e.to_string()))
}

/// Google's consent screen URL for this client.
fn consent_url(client_id: &str, callback_url: &str, state: &str) -> String {
    let scope = SCOPES.join(" ");
    url::Url::parse_with_params(
        AUTHORIZE_URL,
        [
            ("client_id", client_id),
            ("redirect_uri", callback_url),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
            ("prompt", "select_account"),
        ],
    )
    .map_or_else(|_| AUTHORIZE_URL.to_owned(), String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> GoogleConfig {
        GoogleConfig {
            client_id: "1234-abc.apps.googleusercontent.com".to_owned(),
            client_secret: SecretString::from("GOCSPX-test"),
            callback_url: "https://api.novare.store/api/auth/google/callback".to_owned(),
        }
    }

    #[test]
    fn test_consent_url_carries_client_and_state() {
        let url = url::Url::parse(&consent_url(
            "1234-abc.apps.googleusercontent.com",
            "https://api.novare.store/api/auth/google/callback",
            "s7",
        ))
        .unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("1234-abc.apps.googleusercontent.com"));
        assert_eq!(
            get("redirect_uri"),
            Some("https://api.novare.store/api/auth/google/callback")
        );
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("scope"), Some("openid email profile"));
        assert_eq!(get("state"), Some("s7"));
    }

    #[tokio::test]
    async fn test_state_is_accepted_once() {
        let client = GoogleClient::new(&config()).unwrap();
        let url = url::Url::parse(&client.authorization_url().await).unwrap();
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        assert!(client.take_state(&state).await);
        assert!(!client.take_state(&state).await);
        assert!(!client.take_state("forged").await);
    }

    #[test]
    fn test_userinfo_parses() {
        let profile: GoogleProfile = serde_json::from_value(serde_json::json!({
            "sub": "110248495921238986420",
            "email": "ada@gmail.com",
            "email_verified": true,
            "name": "Ada Obi",
            "picture": "https://lh3.googleusercontent.com/a/x"
        }))
        .unwrap();

        assert_eq!(profile.subject, "110248495921238986420");
        assert!(profile.email_verified);
        assert_eq!(profile.name.as_deref(), Some("Ada Obi"));
    }
}
