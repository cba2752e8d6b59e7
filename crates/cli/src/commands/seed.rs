//! Seed the catalog from a YAML file.
//!
//! The file holds `lookbooks` and `products`. Products name their look by
//! slug; slugs default to the slugified title or name.
//!
//! ```yaml
//! lookbooks:
//!   - title: Nothing Ordinary
//!     description: NOVARE SS25
//!     displayOrder: 1
//! products:
//!   - name: Oversized Tee Black
//!     category: Tees
//!     price: "120.00"
//!     stock: 50
//!     sizes: [XS, S, M, L, XL]
//!     lookbook: nothing-ordinary
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use novare_api::db::{LookbookRepository, ProductRepository};
use novare_api::models::product::slugify;
use novare_api::models::{HostedImage, LookbookInput, ProductInput};
use novare_core::{Category, LookbookId, Size};

use super::{DATABASE_URL_VAR, connect, database_url};

/// A catalog file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default)]
    pub lookbooks: Vec<LookbookEntry>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LookbookEntry {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image: Option<HostedImage>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductEntry {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category: Category,
    #[serde(default)]
    pub sizes: Vec<Size>,
    #[serde(default)]
    pub images: Vec<HostedImage>,
    #[serde(default)]
    pub featured: bool,
    /// Slug of the look this product appears in.
    pub lookbook: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl LookbookEntry {
    fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.title))
    }

    fn input(&self) -> LookbookInput {
        LookbookInput {
            title: self.title.trim().to_owned(),
            slug: self.slug(),
            description: self.description.clone(),
            image: self.image.clone(),
            display_order: self.display_order,
            is_active: self.is_active,
            product_ids: None,
        }
    }
}

impl ProductEntry {
    fn input(&self, lookbook_id: Option<LookbookId>) -> ProductInput {
        let mut sizes = self.sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();

        ProductInput {
            name: self.name.trim().to_owned(),
            slug: self.slug.clone().unwrap_or_else(|| slugify(&self.name)),
            description: self.description.clone(),
            price: self.price,
            stock: self.stock,
            category: self.category,
            sizes,
            images: self.images.clone(),
            lookbook_id,
            is_featured: self.featured,
        }
    }
}

/// Check a catalog before touching the database.
///
/// Returns one message per problem; an empty list means the catalog is valid.
#[must_use]
pub fn validate(catalog: &Catalog) -> Vec<String> {
    let mut errors = Vec::new();

    let mut look_slugs = HashSet::new();
    for look in &catalog.lookbooks {
        let slug = look.slug();
        if look.title.trim().is_empty() || slug.is_empty() {
            errors.push(format!("lookbook {:?}: title is required", look.title));
        } else if !look_slugs.insert(slug.clone()) {
            errors.push(format!("lookbook slug {slug:?} appears twice"));
        }
    }

    let mut product_slugs = HashSet::new();
    for product in &catalog.products {
        let input = product.input(None);
        if let Err(msg) = input.validate() {
            errors.push(format!("product {:?}: {msg}", product.name));
            continue;
        }
        if !product_slugs.insert(input.slug.clone()) {
            errors.push(format!("product slug {:?} appears twice", input.slug));
        }
        if let Some(look) = &product.lookbook
            && !look_slugs.contains(look)
        {
            errors.push(format!(
                "product {:?}: unknown lookbook {look:?}",
                product.name
            ));
        }
    }

    errors
}

/// Seed lookbooks and products from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the catalog file
/// * `clear_existing` - If true, delete every product and lookbook first
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read or
/// is invalid, or a database operation fails.
pub async fn catalog(
    file_path: &str,
    clear_existing: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = database_url().ok_or(format!("{DATABASE_URL_VAR} not set"))?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: Catalog = serde_yaml::from_str(&content)?;

    info!(
        lookbooks = catalog.lookbooks.len(),
        products = catalog.products.len(),
        "Parsed catalog"
    );

    let errors = validate(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect(&database_url).await?;

    if clear_existing {
        // Cart lines, wishlist items and reviews cascade; order lines are
        // snapshots and stay.
        let products = sqlx::query("DELETE FROM shop.product")
            .execute(&pool)
            .await?
            .rows_affected();
        let lookbooks = sqlx::query("DELETE FROM shop.lookbook")
            .execute(&pool)
            .await?
            .rows_affected();
        info!(products, lookbooks, "Cleared existing catalog");
    }

    let mut look_ids = HashMap::new();
    let looks = LookbookRepository::new(&pool);
    for entry in &catalog.lookbooks {
        let lookbook = looks.create(&entry.input()).await?;
        info!(id = %lookbook.id, slug = %lookbook.slug, "Created lookbook");
        look_ids.insert(lookbook.slug, lookbook.id);
    }

    let products = ProductRepository::new(&pool);
    for entry in &catalog.products {
        let lookbook_id = entry
            .lookbook
            .as_ref()
            .and_then(|slug| look_ids.get(slug).copied());
        let product = products.create(&entry.input(lookbook_id)).await?;
        info!(id = %product.id, slug = %product.slug, stock = product.stock, "Created product");
    }

    info!(
        lookbooks = catalog.lookbooks.len(),
        products = catalog.products.len(),
        "Seeding complete"
    );

    Ok(())
}
