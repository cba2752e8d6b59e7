//! Lookbook gallery management.
//!
//! Create and update take `multipart/form-data` with `title`, `slug`,
//! `description`, `displayOrder`, `isActive`, `productIds` and an optional
//! `image` file. Every write drops the cached public gallery.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use tracing::instrument;

use novare_core::{LookbookId, ProductId};

use super::form::AdminForm;
use crate::db::LookbookRepository;
use crate::error::{AppError, Result};
use crate::extract::AppPath;
use crate::middleware::RequireAdmin;
use crate::models::product::slugify;
use crate::models::{HostedImage, Lookbook, LookbookInput, LookbookWithProducts};
use crate::routes::lookbook::GALLERY_KEY;
use crate::routes::{Done, Envelope, created, done, missing, ok};
use crate::services::assets::ImageUpload;
use crate::state::AppState;

fn lookbook_input(form: &AdminForm, existing: Option<&Lookbook>) -> Result<LookbookInput> {
    let title = form
        .text("title")
        .map(ToOwned::to_owned)
        .or_else(|| existing.map(|l| l.title.clone()))
        .ok_or_else(|| AppError::BadRequest("title is required".to_owned()))?;

    let slug = form
        .text("slug")
        .map(slugify)
        .or_else(|| existing.map(|l| l.slug.clone()))
        .unwrap_or_else(|| slugify(&title));
    if slug.is_empty() {
        return Err(AppError::BadRequest("slug is required".to_owned()));
    }

    let description = if form.has("description") {
        form.text("description").map(ToOwned::to_owned)
    } else {
        existing.and_then(|l| l.description.clone())
    };

    let product_ids = form
        .list("productIds")
        .map(|ids| {
            ids.iter()
                .map(|id| {
                    id.parse::<ProductId>()
                        .map_err(|_| AppError::BadRequest(format!("invalid product id: {id}")))
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    Ok(LookbookInput {
        display_order: form
            .parse::<i32>("displayOrder")?
            .or_else(|| existing.map(|l| l.display_order))
            .unwrap_or(0),
        is_active: form
            .flag("isActive")?
            .or_else(|| existing.map(|l| l.is_active))
            .unwrap_or(true),
        image: existing.and_then(|l| l.image.clone()),
        title,
        slug,
        description,
        product_ids,
    })
}

/// The single image a look may carry.
fn single_image(mut files: Vec<ImageUpload>) -> Result<Option<ImageUpload>> {
    if files.len() > 1 {
        return Err(AppError::BadRequest(
            "a lookbook takes a single image".to_owned(),
        ));
    }
    Ok(files.pop())
}

async fn upload(state: &AppState, file: Option<ImageUpload>) -> Result<Option<HostedImage>> {
    match file {
        Some(file) => Ok(Some(state.assets().upload(file).await?)),
        None => Ok(None),
    }
}

async fn invalidate_gallery(state: &AppState) {
    state.gallery().invalidate(&GALLERY_KEY).await;
}

/// Every look, active or not, with its products.
pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<LookbookWithProducts>>>> {
    let looks = LookbookRepository::new(state.pool()).list_all().await?;
    Ok(ok(looks))
}

/// Create a look.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Envelope<Lookbook>>)> {
    let mut form = AdminForm::read(multipart?).await?;
    let mut input = lookbook_input(&form, None)?;

    let image = upload(&state, single_image(form.take_files())?).await?;
    input.image.clone_from(&image);

    match LookbookRepository::new(state.pool()).create(&input).await {
        Ok(look) => {
            invalidate_gallery(&state).await;
            tracing::info!(lookbook_id = %look.id, slug = %look.slug, "Lookbook created");
            Ok(created(look))
        }
        Err(e) => {
            state.assets().delete_best_effort(image.as_slice()).await;
            Err(e.into())
        }
    }
}

/// Update a look. A new image replaces the old one.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<LookbookId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<Lookbook>>> {
    let mut form = AdminForm::read(multipart?).await?;
    let looks = LookbookRepository::new(state.pool());

    let existing = looks
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Lookbook not found".to_owned()))?;
    let mut input = lookbook_input(&form, Some(&existing))?;

    let image = upload(&state, single_image(form.take_files())?).await?;
    if image.is_some() {
        input.image.clone_from(&image);
    }

    match looks.update(id, &input).await {
        Ok(look) => {
            if image.is_some() {
                state
                    .assets()
                    .delete_best_effort(existing.image.as_slice())
                    .await;
            }
            invalidate_gallery(&state).await;
            tracing::info!(lookbook_id = %look.id, "Lookbook updated");
            Ok(ok(look))
        }
        Err(e) => {
            state.assets().delete_best_effort(image.as_slice()).await;
            Err(missing("Lookbook")(e))
        }
    }
}

/// Delete a look and its image. Its products stay in the catalog.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    AppPath(id): AppPath<LookbookId>,
) -> Result<Json<Done>> {
    let look = LookbookRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(missing("Lookbook"))?;

    state.assets().delete_best_effort(look.image.as_slice()).await;
    invalidate_gallery(&state).await;
    tracing::info!(lookbook_id = %id, "Lookbook deleted");
    Ok(done("Lookbook removed"))
}
