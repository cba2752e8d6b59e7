//! Paystack API client.
//!
//! Implements [`PaymentGateway`] over the Paystack transaction API:
//! `POST /transaction/initialize` and `GET /transaction/verify/:reference`.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use novare_core::OrderId;

use super::payments::{
    Authorization, GatewayError, InitializeTransaction, PaymentGateway, VerifiedTransaction,
};
use crate::config::PaystackConfig;

/// Outbound request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Every Paystack response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    id: serde_json::Value,
    status: String,
    reference: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    customer: Option<Customer>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Customer {
    #[serde(default)]
    email: Option<String>,
}

/// Read `order_id` from transaction metadata.
///
/// Paystack echoes metadata back as sent, but dashboards and older clients
/// may store it as a string, and an empty metadata field comes back as `""`.
fn metadata_order_id(metadata: &serde_json::Value) -> Option<OrderId> {
    let value = match metadata {
        serde_json::Value::String(raw) => {
            return serde_json::from_str::<serde_json::Value>(raw)
                .ok()
                .as_ref()
                .and_then(metadata_order_id);
        }
        serde_json::Value::Object(map) => map.get("order_id")?,
        _ => return None,
    };

    let id = match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.map(OrderId::new)
}

/// Paystack API client.
#[derive(Clone)]
pub struct PaystackClient {
    client: reqwest::Client,
    base_url: String,
}

impl PaystackClient {
    /// Create a new Paystack client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| GatewayError::Parse(format!("Invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Decode an enveloped response, mapping failures to [`GatewayError`].
    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        if !envelope.status {
            return Err(GatewayError::Rejected(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::Parse("response has no data".to_owned()))
    }
}

impl PaymentGateway for PaystackClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn initialize(
        &self,
        request: &InitializeTransaction,
    ) -> Result<Authorization, GatewayError> {
        let mut body = serde_json::json!({
            "email": request.email,
            "amount": request.amount,
            "currency": request.currency.as_str(),
            "metadata": {
                "order_id": request.order_id,
                "user_id": request.user_id,
            },
        });
        if let Some(callback_url) = &request.callback_url {
            body["callback_url"] = serde_json::Value::from(callback_url.as_str());
        }

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .json(&body)
            .send()
            .await?;

        let data: InitializeData = Self::read(response).await?;
        Ok(Authorization {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    #[instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Parse(format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Parse("base URL cannot have a path".to_owned()))?
            .extend(["transaction", "verify", reference]);

        let response = self.client.get(url).send().await?;
        let data: VerifyData = Self::read(response).await?;

        let id = match data.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };

        Ok(VerifiedTransaction {
            id,
            status: data.status,
            reference: data.reference,
            amount: data.amount,
            email: data.customer.and_then(|c| c.email),
            order_id: metadata_order_id(&data.metadata),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_order_id_from_number() {
        let metadata = json!({ "order_id": 42, "user_id": 7 });
        assert_eq!(metadata_order_id(&metadata), Some(OrderId::new(42)));
    }

    #[test]
    fn test_metadata_order_id_from_string() {
        let metadata = json!({ "order_id": " 42 " });
        assert_eq!(metadata_order_id(&metadata), Some(OrderId::new(42)));
    }

    #[test]
    fn test_metadata_order_id_from_encoded_metadata() {
        let metadata = json!("{\"order_id\":42}");
        assert_eq!(metadata_order_id(&metadata), Some(OrderId::new(42)));
    }

    #[test]
    fn test_metadata_order_id_missing() {
        assert_eq!(metadata_order_id(&json!("")), None);
        assert_eq!(metadata_order_id(&json!({})), None);
        assert_eq!(metadata_order_id(&json!(null)), None);
    }

    #[test]
    fn test_verify_envelope_parses() {
        let raw = json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 4_099_260_516_u64,
                "status": "success",
                "reference": "re4lyvq3s3",
                "amount": 21_500,
                "customer": { "email": "ada@example.com" },
                "metadata": { "order_id": 3 }
            }
        });
        let envelope: Envelope<VerifyData> = serde_json::from_value(raw).unwrap();
        assert!(envelope.status);
        let data = envelope.data.unwrap();
        assert_eq!(data.status, "success");
        assert_eq!(data.amount, 21_500);
        assert_eq!(metadata_order_id(&data.metadata), Some(OrderId::new(3)));
    }
}
