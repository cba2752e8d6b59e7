//! Public catalog route handlers.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use novare_core::Category;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::extract::{AppPath, AppQuery};
use crate::models::product::DEFAULT_PAGE_SIZE;
use crate::models::{Product, ProductFilter, ProductPage};
use crate::routes::{Envelope, ok};
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// A category name, or `All` for no filter.
    pub category: Option<String>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductQuery {
    fn into_filter(self) -> Result<ProductFilter> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(all) if all.eq_ignore_ascii_case("all") => None,
            Some(name) => Some(
                name.parse::<Category>()
                    .map_err(|e| AppError::BadRequest(e.to_string()))?,
            ),
        };

        Ok(ProductFilter {
            category,
            search: self.search,
            featured: self.featured,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        }
        .normalized())
    }
}

/// List products with filters and pagination.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> Result<Json<Envelope<ProductPage>>> {
    let filter = query.into_filter()?;
    let page = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(ok(page))
}

/// Products that belong to a lookbook, ordered by look.
pub async fn lookbook(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Product>>>> {
    let products = ProductRepository::new(state.pool())
        .list_in_lookbooks()
        .await?;
    Ok(ok(products))
}

/// Product detail by slug.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    AppPath(slug): AppPath<String>,
) -> Result<Json<Envelope<Product>>> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product '{slug}' not found")))?;
    Ok(ok(product))
}
