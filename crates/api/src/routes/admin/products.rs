//! Catalog management with image upload.
//!
//! Create and update take `multipart/form-data`: text fields `name`, `slug`,
//! `description`, `price`, `stock`, `category`, `sizes`, `isFeatured`,
//! `lookbookId`, plus any number of image files. On update, absent fields
//! keep their current value and uploaded images replace the old set.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use rust_decimal::Decimal;
use tracing::instrument;

use novare_core::{Category, LookbookId, ProductId, Size};

use super::form::AdminForm;
use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::extract::AppPath;
use crate::middleware::RequireAdmin;
use crate::models::product::slugify;
use crate::models::{HostedImage, Product, ProductInput};
use crate::routes::{Done, Envelope, created, done, missing, ok};
use crate::state::AppState;

/// Merge form fields over an existing product (or defaults when creating).
fn product_input(form: &AdminForm, existing: Option<&Product>) -> Result<ProductInput> {
    let name = form
        .text("name")
        .map(ToOwned::to_owned)
        .or_else(|| existing.map(|p| p.name.clone()))
        .ok_or_else(|| AppError::BadRequest("name is required".to_owned()))?;

    let slug = form
        .text("slug")
        .map(slugify)
        .or_else(|| existing.map(|p| p.slug.clone()))
        .unwrap_or_else(|| slugify(&name));

    let description = if form.has("description") {
        form.text("description").unwrap_or_default().to_owned()
    } else {
        existing.map(|p| p.description.clone()).unwrap_or_default()
    };

    let price = form
        .parse::<Decimal>("price")?
        .or_else(|| existing.map(|p| p.price))
        .ok_or_else(|| AppError::BadRequest("price is required".to_owned()))?;

    let category = form
        .parse::<Category>("category")?
        .or_else(|| existing.map(|p| p.category))
        .ok_or_else(|| AppError::BadRequest("category is required".to_owned()))?;

    let sizes = match form.list("sizes") {
        Some(labels) => {
            Size::parse_list(labels).map_err(|e| AppError::BadRequest(e.to_string()))?
        }
        None => existing.map(|p| p.sizes.clone()).unwrap_or_default(),
    };

    let lookbook_id = if form.has("lookbookId") {
        form.parse::<LookbookId>("lookbookId")?
    } else {
        existing.and_then(|p| p.lookbook_id)
    };

    let input = ProductInput {
        stock: form
            .parse::<i32>("stock")?
            .or_else(|| existing.map(|p| p.stock))
            .unwrap_or(0),
        is_featured: form
            .flag("isFeatured")?
            .or_else(|| existing.map(|p| p.is_featured))
            .unwrap_or(false),
        images: existing.map(|p| p.images.clone()).unwrap_or_default(),
        name,
        slug,
        description,
        price,
        category,
        sizes,
        lookbook_id,
    };
    input.validate().map_err(AppError::BadRequest)?;
    Ok(input)
}

/// Every product, newest first.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let products = ProductRepository::new(state.pool()).list_all().await?;
    Ok(ok(products))
}

/// One product by id.
pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<ProductId>,
) -> Result<Json<Envelope<Product>>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    Ok(ok(product))
}

/// Create a product, uploading its images first.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Envelope<Product>>)> {
    let mut form = AdminForm::read(multipart?).await?;
    let mut input = product_input(&form, None)?;

    let uploaded = state.assets().upload_all(form.take_files()).await?;
    input.images.clone_from(&uploaded);

    match ProductRepository::new(state.pool()).create(&input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
            Ok(created(product))
        }
        Err(e) => {
            state.assets().delete_best_effort(&uploaded).await;
            Err(e.into())
        }
    }
}

/// Update a product. New images replace the old ones, which are then removed
/// from the host.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<ProductId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<Product>>> {
    let mut form = AdminForm::read(multipart?).await?;
    let products = ProductRepository::new(state.pool());

    let existing = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    let mut input = product_input(&form, Some(&existing))?;

    let files = form.take_files();
    let uploaded: Vec<HostedImage> = if files.is_empty() {
        Vec::new()
    } else {
        state.assets().upload_all(files).await?
    };
    if !uploaded.is_empty() {
        input.images.clone_from(&uploaded);
    }

    match products.update(id, &input).await {
        Ok(product) => {
            if !uploaded.is_empty() {
                state.assets().delete_best_effort(&existing.images).await;
            }
            tracing::info!(product_id = %product.id, "Product updated");
            Ok(ok(product))
        }
        Err(e) => {
            state.assets().delete_best_effort(&uploaded).await;
            Err(missing("Product")(e))
        }
    }
}

/// Delete a product and its hosted images.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<ProductId>,
) -> Result<Json<Done>> {
    let product = ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(missing("Product"))?;

    state.assets().delete_best_effort(&product.images).await;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(done("Product deleted successfully"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn existing() -> Product {
        Product {
            id: ProductId::new(9),
            name: "Box Tee".to_owned(),
            slug: "box-tee".to_owned(),
            description: "Heavy cotton".to_owned(),
            price: Decimal::new(4500, 2),
            stock: 12,
            category: Category::Tees,
            sizes: vec![Size::Small, Size::Medium],
            images: vec![HostedImage {
                url: "https://img.example/tee.webp".to_owned(),
                public_id: "novare/tee".to_owned(),
            }],
            lookbook_id: Some(LookbookId::new(2)),
            is_featured: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_derives_slug_and_defaults() {
        let form = AdminForm::from_pairs(&[
            ("name", "Heavy Hoodie"),
            ("price", "80.00"),
            ("category", "Hoodies"),
            ("sizes", "L,M"),
        ]);
        let input = product_input(&form, None).unwrap();

        assert_eq!(input.slug, "heavy-hoodie");
        assert_eq!(input.stock, 0);
        assert!(!input.is_featured);
        assert_eq!(input.sizes, vec![Size::Medium, Size::Large]);
        assert!(input.images.is_empty());
    }

    #[test]
    fn test_create_requires_price_and_category() {
        let form = AdminForm::from_pairs(&[("name", "Cap")]);
        assert!(matches!(
            product_input(&form, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let product = existing();
        let form = AdminForm::from_pairs(&[("stock", "3")]);
        let input = product_input(&form, Some(&product)).unwrap();

        assert_eq!(input.stock, 3);
        assert_eq!(input.name, "Box Tee");
        assert_eq!(input.price, product.price);
        assert_eq!(input.lookbook_id, product.lookbook_id);
        assert_eq!(input.images, product.images);
    }

    #[test]
    fn test_blank_lookbook_detaches() {
        let product = existing();
        let form = AdminForm::from_pairs(&[("lookbookId", "")]);
        let input = product_input(&form, Some(&product)).unwrap();
        assert_eq!(input.lookbook_id, None);
    }

    #[test]
    fn test_negative_stock_rejected() {
        let form = AdminForm::from_pairs(&[("stock", "-1")]);
        assert!(product_input(&form, Some(&existing())).is_err());
    }
}
