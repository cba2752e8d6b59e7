//! Order route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use novare_core::{OrderId, OrderStatus};

use crate::db::{CheckoutRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::extract::{AppJson, AppPath};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Order;
use crate::routes::{Envelope, created, missing, ok};
use crate::services::checkout::{PlaceOrderRequest, place_order};
use crate::state::AppState;

/// Admin status change.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Place an order from the signed-in user's cart.
#[instrument(skip(state, request), fields(user_id = %user.id))]
pub async fn place(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppJson(request): AppJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<Order>>)> {
    let store = CheckoutRepository::new(state.pool());
    let order = place_order(&store, user.id, request).await?;
    Ok(created(order))
}

/// The signed-in user's orders, newest first.
pub async fn mine(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Order>>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ok(orders))
}

/// One order, visible to its owner and to admins.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(id): AppPath<OrderId>,
) -> Result<Json<Envelope<Order>>> {
    let order = OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

    if !user.can_access(order.user_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this order".to_owned(),
        ));
    }
    Ok(ok(order))
}

/// Every order, newest first.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Order>>>> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;
    Ok(ok(orders))
}

/// Move an order to any status; `delivered` stamps `deliveredAt`.
#[instrument(skip(state, request), fields(admin_id = %admin.id, status = %request.status))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<OrderId>,
    AppJson(request): AppJson<StatusRequest>,
) -> Result<Json<Envelope<Order>>> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, request.status)
        .await
        .map_err(missing("Order"))?;

    tracing::info!(order_id = %order.id, "Order status updated");
    Ok(ok(order))
}
