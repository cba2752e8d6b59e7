//! Public lookbook gallery handlers.
//!
//! The active gallery is served from a short-lived in-memory cache that admin
//! lookbook writes invalidate.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::db::LookbookRepository;
use crate::error::{AppError, Result};
use crate::extract::AppPath;
use crate::models::LookbookWithProducts;
use crate::routes::{Envelope, ok};
use crate::state::AppState;

/// Cache key for the active gallery.
pub const GALLERY_KEY: &str = "active";

/// Active looks in display order, with their products.
pub async fn index(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<LookbookWithProducts>>>> {
    if let Some(gallery) = state.gallery().get(GALLERY_KEY).await {
        return Ok(ok(gallery.as_ref().clone()));
    }

    let gallery = LookbookRepository::new(state.pool()).list_active().await?;
    state
        .gallery()
        .insert(GALLERY_KEY, Arc::new(gallery.clone()))
        .await;
    Ok(ok(gallery))
}

/// One active look by slug.
pub async fn show(
    State(state): State<AppState>,
    AppPath(slug): AppPath<String>,
) -> Result<Json<Envelope<LookbookWithProducts>>> {
    let look = LookbookRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Lookbook not found".to_owned()))?;
    Ok(ok(look))
}
