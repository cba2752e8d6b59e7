//! Lookbook gallery types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use novare_core::{LookbookId, ProductId};

use super::{HostedImage, Product};

/// A styled look in the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lookbook {
    pub id: LookbookId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<HostedImage>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A look together with the products featured in it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookbookWithProducts {
    #[serde(flatten)]
    pub lookbook: Lookbook,
    pub products: Vec<Product>,
}

/// Fields for creating or replacing a look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbookInput {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<HostedImage>,
    pub display_order: i32,
    pub is_active: bool,
    /// Products to feature, replacing any previous selection. `None` keeps
    /// the current selection.
    pub product_ids: Option<Vec<ProductId>>,
}
