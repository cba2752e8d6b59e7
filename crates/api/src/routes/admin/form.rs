//! Multipart form reader for admin uploads.
//!
//! Text parts are collected by name (repeated names accumulate); parts with a
//! file name become [`ImageUpload`]s.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use axum::extract::Multipart;

use crate::error::{AppError, Result};
use crate::services::assets::ImageUpload;

/// Largest accepted request body for admin uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A parsed multipart form.
#[derive(Debug, Default)]
pub struct AdminForm {
    fields: HashMap<String, Vec<String>>,
    files: Vec<ImageUpload>,
}

impl AdminForm {
    /// Drain a multipart body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed body or a file that is
    /// not an image.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();

            if let Some(file_name) = field.file_name().map(ToOwned::to_owned) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    continue;
                }
                if !content_type.starts_with("image/") {
                    return Err(AppError::BadRequest(format!(
                        "{file_name} is not an image"
                    )));
                }
                form.files.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field.text().await?;
                form.fields.entry(name).or_default().push(value);
            }
        }

        Ok(form)
    }

    /// Build a form from text pairs.
    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut form = Self::default();
        for (name, value) in pairs {
            form.fields
                .entry((*name).to_owned())
                .or_default()
                .push((*value).to_owned());
        }
        form
    }

    /// Whether the client sent a field at all, even empty.
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// First non-blank value of a field, trimmed.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)?
            .iter()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// A required text field.
    pub fn required(&self, name: &str) -> Result<&str> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
    }

    /// Parse an optional field.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text(name)
            .map(|value| {
                value
                    .parse()
                    .map_err(|e| AppError::BadRequest(format!("invalid {name}: {e}")))
            })
            .transpose()
    }

    /// Parse a boolean field; accepts `true/false`, `1/0` and `on/off`.
    pub fn flag(&self, name: &str) -> Result<Option<bool>> {
        self.text(name)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(true),
                "false" | "0" | "off" | "no" => Ok(false),
                _ => Err(AppError::BadRequest(format!("invalid {name}: {value}"))),
            })
            .transpose()
    }

    /// All values of a list field. Accepts repeated parts, comma-separated
    /// text, or a JSON array of strings or numbers. `None` if absent.
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        let values = self.fields.get(name)?;
        let mut items = Vec::new();
        for value in values {
            let value = value.trim();
            if let Ok(array) = serde_json::from_str::<Vec<serde_json::Value>>(value) {
                items.extend(array.into_iter().map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }));
            } else {
                items.extend(value.split(',').map(|item| item.trim().to_owned()));
            }
        }
        items.retain(|item| !item.is_empty());
        Some(items)
    }

    /// Take the uploaded files.
    pub fn take_files(&mut self) -> Vec<ImageUpload> {
        std::mem::take(&mut self.files)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_skips_blank_values() {
        let form = AdminForm::from_pairs(&[("name", "  "), ("name", " Tee ")]);
        assert_eq!(form.text("name"), Some("Tee"));
        assert!(form.required("slug").is_err());
    }

    #[test]
    fn test_list_accepts_all_encodings() {
        let repeated = AdminForm::from_pairs(&[("sizes", "S"), ("sizes", "M")]);
        assert_eq!(repeated.list("sizes").unwrap(), vec!["S", "M"]);

        let commas = AdminForm::from_pairs(&[("sizes", "S, M,,L")]);
        assert_eq!(commas.list("sizes").unwrap(), vec!["S", "M", "L"]);

        let json = AdminForm::from_pairs(&[("productIds", "[3, 7]")]);
        assert_eq!(json.list("productIds").unwrap(), vec!["3", "7"]);

        let empty = AdminForm::from_pairs(&[("productIds", "")]);
        assert_eq!(empty.list("productIds").unwrap(), Vec::<String>::new());
        assert_eq!(empty.list("sizes"), None);
    }

    #[test]
    fn test_flag_and_parse() {
        let form = AdminForm::from_pairs(&[("isFeatured", "on"), ("stock", "x")]);
        assert_eq!(form.flag("isFeatured").unwrap(), Some(true));
        assert!(form.parse::<i32>("stock").is_err());
        assert_eq!(form.parse::<i32>("missing").unwrap(), None);
    }
}
