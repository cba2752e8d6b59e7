//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients get a JSON body
//! `{success: false, error, message}` that never includes internal detail.

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use novare_core::ProductId;

use crate::db::RepositoryError;
use crate::services::assets::AssetError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Order placement failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Asset host operation failed.
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller may not act on this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How an error is presented to the client.
struct Presentation {
    status: StatusCode,
    kind: &'static str,
    message: String,
    product: Option<(ProductId, String)>,
}

impl Presentation {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            product: None,
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            "Internal server error",
        )
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }

    fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "ValidationError", message)
    }

    fn insufficient_stock(product_id: ProductId, name: &str) -> Self {
        Self {
            product: Some((product_id, name.to_owned())),
            ..Self::new(
                StatusCode::CONFLICT,
                "InsufficientStock",
                format!("Insufficient stock for {name}"),
            )
        }
    }
}

fn present_repository(err: &RepositoryError) -> Presentation {
    match err {
        RepositoryError::NotFound => Presentation::not_found("Not found"),
        RepositoryError::Conflict(msg) => {
            Presentation::new(StatusCode::CONFLICT, "Conflict", msg.clone())
        }
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            Presentation::internal()
        }
    }
}

fn present_auth(err: &AuthError) -> Presentation {
    match err {
        AuthError::InvalidCredentials => Presentation::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Invalid credentials",
        ),
        AuthError::InvalidToken => Presentation::new(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Invalid or expired token",
        ),
        AuthError::UserNotFound => Presentation::not_found("User not found"),
        AuthError::UserAlreadyExists => Presentation::new(
            StatusCode::CONFLICT,
            "Conflict",
            "An account with this username or email already exists",
        ),
        AuthError::WeakPassword(msg) | AuthError::Validation(msg) => {
            Presentation::validation(msg.clone())
        }
        AuthError::InvalidEmail(_) => Presentation::validation("Invalid email address"),
        AuthError::Repository(e) => present_repository(e),
        AuthError::EmailUnavailable
        | AuthError::Email(_)
        | AuthError::Token(_)
        | AuthError::PasswordHash => Presentation::internal(),
    }
}

fn present_checkout(err: &CheckoutError) -> Presentation {
    match err {
        CheckoutError::UserNotFound => Presentation::not_found("User not found"),
        CheckoutError::EmptyCart => {
            Presentation::new(StatusCode::BAD_REQUEST, "EmptyCart", "Cart is empty")
        }
        CheckoutError::ProductNotFound(id) => Presentation {
            product: Some((*id, String::new())),
            ..Presentation::not_found(format!("Product {id} not found"))
        },
        CheckoutError::InsufficientStock { product_id, name } => {
            Presentation::insufficient_stock(*product_id, name)
        }
        CheckoutError::CartChanged => Presentation::new(
            StatusCode::CONFLICT,
            "CartChanged",
            "Cart changed during checkout, please review it and try again",
        ),
        CheckoutError::Validation(msg) => Presentation::validation(msg.clone()),
        CheckoutError::Repository(e) => present_repository(e),
    }
}

fn present_payment(err: &PaymentError) -> Presentation {
    match err {
        PaymentError::OrderNotFound => Presentation::not_found("Order not found"),
        PaymentError::Forbidden => Presentation::new(
            StatusCode::FORBIDDEN,
            "Forbidden",
            "Not allowed to pay for this order",
        ),
        PaymentError::NotPayable { .. }
        | PaymentError::InvalidReference
        | PaymentError::MissingOrderReference
        | PaymentError::InvalidAmount => Presentation::validation(err.to_string()),
        PaymentError::Gateway(_) => Presentation::new(
            StatusCode::BAD_GATEWAY,
            "UpstreamPaymentError",
            "Payment gateway error",
        ),
        PaymentError::Repository(e) => present_repository(e),
    }
}

impl AppError {
    fn present(&self) -> Presentation {
        match self {
            Self::Database(e) => present_repository(e),
            Self::Auth(e) => present_auth(e),
            Self::Checkout(e) => present_checkout(e),
            Self::Payment(e) => present_payment(e),
            Self::Asset(_) => Presentation::new(
                StatusCode::BAD_GATEWAY,
                "UpstreamAssetError",
                "Image host error",
            ),
            Self::NotFound(msg) => Presentation::not_found(msg.clone()),
            Self::Unauthorized(msg) => {
                Presentation::new(StatusCode::UNAUTHORIZED, "Unauthorized", msg.clone())
            }
            Self::Forbidden(msg) => {
                Presentation::new(StatusCode::FORBIDDEN, "Forbidden", msg.clone())
            }
            Self::Conflict(msg) => Presentation::new(StatusCode::CONFLICT, "Conflict", msg.clone()),
            Self::BadRequest(msg) => Presentation::validation(msg.clone()),
            Self::RateLimited => Presentation::new(
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimited",
                "Too many requests",
            ),
            Self::Internal(_) => Presentation::internal(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let presentation = self.present();

        // Capture server and upstream errors to Sentry
        if presentation.status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut body = json!({
            "success": false,
            "error": presentation.kind,
            "message": presentation.message,
        });
        if let Some((product_id, name)) = presentation.product {
            body["productId"] = json!(product_id);
            if !name.is_empty() {
                body["productName"] = json!(name);
            }
        }

        (presentation.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_product() {
        let (status, body) = body_of(AppError::Checkout(CheckoutError::InsufficientStock {
            product_id: ProductId::new(2),
            name: "Box Tee".to_owned(),
        }))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "InsufficientStock");
        assert_eq!(body["productId"], 2);
        assert_eq!(body["productName"], "Box Tee");
    }

    #[tokio::test]
    async fn test_empty_cart_is_bad_request() {
        let (status, body) = body_of(CheckoutError::EmptyCart.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "EmptyCart");
    }

    #[tokio::test]
    async fn test_cart_changed_is_conflict() {
        let (status, body) = body_of(CheckoutError::CartChanged.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "CartChanged");
        assert!(body.get("productId").is_none());
    }

    #[tokio::test]
    async fn test_database_error_hides_detail() {
        let (status, body) = body_of(AppError::Database(RepositoryError::DataCorruption(
            "secret detail".to_owned(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_repository_conflict_maps_to_409() {
        let (status, body) = body_of(AppError::Database(RepositoryError::Conflict(
            "product slug already exists".to_owned(),
        )))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Conflict");
    }

    #[tokio::test]
    async fn test_gateway_failure_is_bad_gateway() {
        let err = PaymentError::Gateway(crate::services::payments::GatewayError::Rejected(
            "Invalid key".to_owned(),
        ));
        let (status, body) = body_of(err.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "UpstreamPaymentError");
    }
}
