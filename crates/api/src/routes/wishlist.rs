//! Wishlist route handlers.

use axum::{Json, extract::State};
use serde::Deserialize;

use novare_core::ProductId;

use crate::db::WishlistRepository;
use crate::error::Result;
use crate::extract::{AppJson, AppPath};
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::routes::{Envelope, missing, ok};
use crate::state::AppState;

/// Add-to-wishlist form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

/// Saved products, most recent first.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let products = WishlistRepository::new(state.pool()).list(user.id).await?;
    Ok(ok(products))
}

/// Save a product. Saving it twice is a no-op.
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppJson(request): AppJson<WishlistRequest>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let wishlist = WishlistRepository::new(state.pool());
    wishlist
        .add(user.id, request.product_id)
        .await
        .map_err(missing("Product"))?;
    Ok(ok(wishlist.list(user.id).await?))
}

/// Forget a saved product.
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(product_id): AppPath<ProductId>,
) -> Result<Json<Envelope<Vec<Product>>>> {
    let wishlist = WishlistRepository::new(state.pool());
    wishlist.remove(user.id, product_id).await?;
    Ok(ok(wishlist.list(user.id).await?))
}
