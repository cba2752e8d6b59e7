//! Product review route handlers.
//!
//! The `{id}` segment is a product id for `GET`/`POST` and a review id for
//! `PUT`/`DELETE`.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use novare_core::{ProductId, ReviewId};

use crate::db::ReviewRepository;
use crate::error::{AppError, Result};
use crate::extract::{AppJson, AppPath};
use crate::middleware::RequireAuth;
use crate::models::{Review, ReviewInput};
use crate::routes::{Done, Envelope, created, done, missing, ok};
use crate::state::AppState;

/// Review form.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: String,
}

impl TryFrom<ReviewRequest> for ReviewInput {
    type Error = AppError;

    fn try_from(request: ReviewRequest) -> Result<Self> {
        Self::new(request.rating, &request.comment).map_err(AppError::BadRequest)
    }
}

/// Reviews of a product, newest first.
pub async fn index(
    State(state): State<AppState>,
    AppPath(product_id): AppPath<ProductId>,
) -> Result<Json<Envelope<Vec<Review>>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(ok(reviews))
}

/// Review a product. One review per user per product.
#[instrument(skip(state, request), fields(user_id = %user.id))]
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(product_id): AppPath<ProductId>,
    AppJson(request): AppJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Envelope<Review>>)> {
    let input = ReviewInput::try_from(request)?;
    let review = ReviewRepository::new(state.pool())
        .create(product_id, user.id, &input)
        .await
        .map_err(missing("Product"))?;
    Ok(created(review))
}

/// Edit one of the caller's reviews.
#[instrument(skip(state, request), fields(user_id = %user.id))]
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(id): AppPath<ReviewId>,
    AppJson(request): AppJson<ReviewRequest>,
) -> Result<Json<Envelope<Review>>> {
    let input = ReviewInput::try_from(request)?;
    let reviews = ReviewRepository::new(state.pool());

    let review = reviews
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_owned()))?;
    if review.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to edit this review".to_owned(),
        ));
    }

    let review = reviews.update(id, &input).await.map_err(missing("Review"))?;
    Ok(ok(review))
}

/// Delete a review; its author or an admin may.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn destroy(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    AppPath(id): AppPath<ReviewId>,
) -> Result<Json<Done>> {
    let reviews = ReviewRepository::new(state.pool());

    let review = reviews
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_owned()))?;
    if !user.can_access(review.user_id) {
        return Err(AppError::Forbidden(
            "Not authorized to delete this review".to_owned(),
        ));
    }

    reviews.delete(id).await.map_err(missing("Review"))?;
    Ok(done("Review removed"))
}
