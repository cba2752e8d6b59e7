//! Cart route handlers.
//!
//! Every mutation answers with the whole cart so the client can re-render
//! without a second request. Stock is not checked until an order is placed.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use novare_core::{CartLineId, ProductId, Size, UserId};

use crate::db::cart::MAX_LINE_QUANTITY;
use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::extract::{AppJson, AppPath};
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::routes::{Envelope, missing, ok};
use crate::state::AppState;

/// Add-to-cart form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub size: Size,
    pub quantity: Option<i32>,
}

/// Quantity update form.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

fn positive_quantity(quantity: i32) -> Result<i32> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_owned(),
        ));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity must be at most {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(quantity)
}

async fn load(state: &AppState, user_id: UserId) -> Result<Json<Envelope<Cart>>> {
    let lines = CartRepository::new(state.pool()).list(user_id).await?;
    Ok(ok(Cart::new(lines)))
}

/// The signed-in user's cart.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Cart>>> {
    load(&state, user.id).await
}

/// Add a product in a size, merging with an existing line.
#[instrument(skip(state, request), fields(user_id = %user.id, product_id = %request.product_id))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppJson(request): AppJson<AddToCartRequest>,
) -> Result<Json<Envelope<Cart>>> {
    let quantity = positive_quantity(request.quantity.unwrap_or(1))?;

    let product = ProductRepository::new(state.pool())
        .get_by_id(request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    if !product.offers_size(request.size) {
        return Err(AppError::BadRequest(format!(
            "{} is not available in size {}",
            product.name, request.size
        )));
    }

    CartRepository::new(state.pool())
        .add(user.id, product.id, request.size, quantity)
        .await?;

    load(&state, user.id).await
}

/// Set the quantity of a line.
#[instrument(skip(state, request), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(line_id): AppPath<CartLineId>,
    AppJson(request): AppJson<UpdateQuantityRequest>,
) -> Result<Json<Envelope<Cart>>> {
    let quantity = positive_quantity(request.quantity)?;
    CartRepository::new(state.pool())
        .set_quantity(user.id, line_id, quantity)
        .await
        .map_err(missing("Cart item"))?;

    load(&state, user.id).await
}

/// Remove a line. Unknown lines are ignored.
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(line_id): AppPath<CartLineId>,
) -> Result<Json<Envelope<Cart>>> {
    CartRepository::new(state.pool())
        .remove(user.id, line_id)
        .await?;
    load(&state, user.id).await
}

/// Empty the cart.
pub async fn clear(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Cart>>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(ok(Cart::new(Vec::new())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(positive_quantity(0).is_err());
        assert!(positive_quantity(-3).is_err());
        assert!(matches!(positive_quantity(2), Ok(2)));
    }

    #[test]
    fn test_quantity_is_capped() {
        assert!(matches!(
            positive_quantity(MAX_LINE_QUANTITY),
            Ok(MAX_LINE_QUANTITY)
        ));
        assert!(matches!(
            positive_quantity(MAX_LINE_QUANTITY + 1),
            Err(AppError::BadRequest(_))
        ));
        assert!(positive_quantity(i32::MAX).is_err());
    }
}
