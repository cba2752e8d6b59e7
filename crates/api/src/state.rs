//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::models::LookbookWithProducts;
use crate::services::assets::{AssetError, CloudinaryClient};
use crate::services::auth::TokenService;
use crate::services::email::EmailService;
use crate::services::google::{GoogleClient, GoogleError};
use crate::services::payments::GatewayError;
use crate::services::paystack::PaystackClient;

/// How long the public lookbook gallery is served from memory.
const GALLERY_TTL: Duration = Duration::from_secs(300);

/// Cached public lookbook gallery.
pub type GalleryCache = Cache<&'static str, Arc<Vec<LookbookWithProducts>>>;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("asset client: {0}")]
    Asset(#[from] AssetError),
    #[error("smtp transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("google client: {0}")]
    Google(#[from] GoogleError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenService,
    paystack: PaystackClient,
    assets: CloudinaryClient,
    email: Option<EmailService>,
    google: Option<GoogleClient>,
    gallery: GalleryCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an outbound client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let tokens = TokenService::new(&config.jwt);
        let paystack = PaystackClient::new(&config.paystack)?;
        let assets = CloudinaryClient::new(&config.cloudinary)?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;
        if email.is_none() {
            tracing::warn!("SMTP_HOST not set; password reset e-mail is disabled");
        }
        let google = config.google.as_ref().map(GoogleClient::new).transpose()?;

        let gallery = Cache::builder()
            .max_capacity(1)
            .time_to_live(GALLERY_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                paystack,
                assets,
                email,
                google,
                gallery,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the JWT service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the Paystack client.
    #[must_use]
    pub fn paystack(&self) -> &PaystackClient {
        &self.inner.paystack
    }

    /// Get a reference to the Cloudinary client.
    #[must_use]
    pub fn assets(&self) -> &CloudinaryClient {
        &self.inner.assets
    }

    /// The mailer, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// The Google OAuth client, if Google sign-in is configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }

    /// Get a reference to the lookbook gallery cache.
    #[must_use]
    pub fn gallery(&self) -> &GalleryCache {
        &self.inner.gallery
    }
}
