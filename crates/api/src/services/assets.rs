//! Cloudinary client for product and lookbook images.
//!
//! Uploads are signed with the API secret (SHA-256) and forced to `webp`.
//! Deletion goes through the Admin API with basic auth.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::CloudinaryConfig;
use crate::models::HostedImage;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Outbound request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Format every upload is converted to.
const UPLOAD_FORMAT: &str = "webp";

/// Errors that can occur when talking to the asset host.
#[derive(Debug, Error)]
pub enum AssetError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// An uploaded file awaiting transfer to the host.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

/// Sign upload parameters: SHA-256 over the `&`-joined, key-sorted pairs
/// followed by the API secret.
fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable_by_key(|(key, _)| *key);
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cloudinary API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    folder: String,
}

impl CloudinaryClient {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CloudinaryConfig) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            folder: config.folder.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AssetError> {
        Url::parse(&format!("{API_BASE}/{}/{path}", self.cloud_name))
            .map_err(|e| AssetError::Parse(format!("Invalid endpoint: {e}")))
    }

    /// Upload one image into the configured folder.
    ///
    /// # Errors
    ///
    /// Returns error if the upload request fails or is rejected.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, bytes = upload.bytes.len()))]
    pub async fn upload(&self, upload: ImageUpload) -> Result<HostedImage, AssetError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("folder", self.folder.as_str()),
                ("format", UPLOAD_FORMAT),
                ("timestamp", timestamp.as_str()),
            ],
            self.api_secret.expose_secret(),
        );

        let file = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("folder", self.folder.clone())
            .text("format", UPLOAD_FORMAT)
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("image/upload")?)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssetError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AssetError::Parse(e.to_string()))?;

        tracing::info!(public_id = %uploaded.public_id, "Image uploaded");
        Ok(HostedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// Upload several images, stopping at the first failure.
    ///
    /// Images already uploaded when a later one fails are removed again.
    ///
    /// # Errors
    ///
    /// Returns the first upload error.
    pub async fn upload_all(&self, uploads: Vec<ImageUpload>) -> Result<Vec<HostedImage>, AssetError> {
        let mut hosted = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.upload(upload).await {
                Ok(image) => hosted.push(image),
                Err(e) => {
                    self.delete_best_effort(&hosted).await;
                    return Err(e);
                }
            }
        }
        Ok(hosted)
    }

    /// Delete images by public id.
    ///
    /// # Errors
    ///
    /// Returns error if the delete request fails or is rejected.
    #[instrument(skip(self, images), fields(count = images.len()))]
    pub async fn delete(&self, images: &[HostedImage]) -> Result<(), AssetError> {
        if images.is_empty() {
            return Ok(());
        }

        let mut url = self.endpoint("resources/image/upload")?;
        {
            let mut query = url.query_pairs_mut();
            for image in images {
                query.append_pair("public_ids[]", &image.public_id);
            }
        }

        let response = self
            .client
            .delete(url)
            .basic_auth(&self.api_key, Some(self.api_secret.expose_secret()))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssetError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Delete images, logging instead of failing.
    pub async fn delete_best_effort(&self, images: &[HostedImage]) {
        if let Err(e) = self.delete(images).await {
            tracing::warn!(error = %e, count = images.len(), "Failed to delete hosted images");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_params() {
        let a = sign(&[("timestamp", "1"), ("folder", "novare")], "secret");
        let b = sign(&[("folder", "novare"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_matches_manual_digest() {
        let mut hasher = Sha256::new();
        hasher.update(b"folder=novare&format=webp&timestamp=1700000000secret");
        let expected = hex::encode(hasher.finalize());

        let actual = sign(
            &[
                ("timestamp", "1700000000"),
                ("format", "webp"),
                ("folder", "novare"),
            ],
            "secret",
        );
        assert_eq!(actual, expected);
    }
}
