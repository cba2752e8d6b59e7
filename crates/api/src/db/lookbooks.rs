//! Lookbook repository for database operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use novare_core::{LookbookId, ProductId};

use super::products::{ProductRow, into_products};
use super::{RepositoryError, conflict_on_unique};
use crate::models::{HostedImage, Lookbook, LookbookInput, LookbookWithProducts, Product};

#[derive(Debug, sqlx::FromRow)]
struct LookbookRow {
    id: i32,
    title: String,
    slug: String,
    description: Option<String>,
    image: Option<Json<HostedImage>>,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LookbookRow> for Lookbook {
    fn from(row: LookbookRow) -> Self {
        Self {
            id: LookbookId::new(row.id),
            title: row.title,
            slug: row.slug,
            description: row.description,
            image: row.image.map(|json| json.0),
            display_order: row.display_order,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Point exactly `product_ids` at a look, detaching any others.
async fn assign_products(
    tx: &mut Transaction<'_, Postgres>,
    id: i32,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    let ids: Vec<i32> = product_ids.iter().map(|id| id.as_i32()).collect();

    sqlx::query(
        "UPDATE shop.product SET lookbook_id = NULL WHERE lookbook_id = $1 AND NOT (id = ANY($2))",
    )
    .bind(id)
    .bind(&ids)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE shop.product SET lookbook_id = $1 WHERE id = ANY($2)")
        .bind(id)
        .bind(&ids)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Repository for the lookbook gallery.
pub struct LookbookRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LookbookRepository<'a> {
    /// Create a new lookbook repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn with_products(
        &self,
        looks: Vec<Lookbook>,
    ) -> Result<Vec<LookbookWithProducts>, RepositoryError> {
        let ids: Vec<i32> = looks.iter().map(|look| look.id.as_i32()).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, stock, category, sizes, images,
                   lookbook_id, is_featured, created_at, updated_at
            FROM shop.product
            WHERE lookbook_id = ANY($1)
            ORDER BY lookbook_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_look: HashMap<LookbookId, Vec<Product>> = HashMap::new();
        for product in into_products(rows)? {
            if let Some(look) = product.lookbook_id {
                by_look.entry(look).or_default().push(product);
            }
        }

        Ok(looks
            .into_iter()
            .map(|lookbook| LookbookWithProducts {
                products: by_look.remove(&lookbook.id).unwrap_or_default(),
                lookbook,
            })
            .collect())
    }

    /// Active looks in display order, with their products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<LookbookWithProducts>, RepositoryError> {
        let rows = sqlx::query_as::<_, LookbookRow>(
            r"
            SELECT id, title, slug, description, image, display_order, is_active,
                   created_at, updated_at
            FROM shop.lookbook
            WHERE is_active
            ORDER BY display_order, id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        self.with_products(rows.into_iter().map(Lookbook::from).collect())
            .await
    }

    /// Every look, active or not, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<LookbookWithProducts>, RepositoryError> {
        let rows = sqlx::query_as::<_, LookbookRow>(
            r"
            SELECT id, title, slug, description, image, display_order, is_active,
                   created_at, updated_at
            FROM shop.lookbook
            ORDER BY display_order, id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        self.with_products(rows.into_iter().map(Lookbook::from).collect())
            .await
    }

    /// An active look by slug, with its products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<LookbookWithProducts>, RepositoryError> {
        let row = sqlx::query_as::<_, LookbookRow>(
            r"
            SELECT id, title, slug, description, image, display_order, is_active,
                   created_at, updated_at
            FROM shop.lookbook
            WHERE slug = $1 AND is_active
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.with_products(vec![row.into()]).await?.pop())
    }

    /// Get a look by ID regardless of whether it is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: LookbookId) -> Result<Option<Lookbook>, RepositoryError> {
        let row = sqlx::query_as::<_, LookbookRow>(
            r"
            SELECT id, title, slug, description, image, display_order, is_active,
                   created_at, updated_at
            FROM shop.lookbook
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Lookbook::from))
    }

    /// Create a look and attach its products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &LookbookInput) -> Result<Lookbook, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LookbookRow>(
            r"
            INSERT INTO shop.lookbook (title, slug, description, image, display_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, slug, description, image, display_order, is_active,
                      created_at, updated_at
            ",
        )
        .bind(&input.title)
        .bind(&input.slug)
        .bind(input.description.as_deref())
        .bind(input.image.as_ref().map(Json))
        .bind(input.display_order)
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "lookbook slug"))?;

        if let Some(product_ids) = &input.product_ids {
            assign_products(&mut tx, row.id, product_ids).await?;
        }
        tx.commit().await?;

        Ok(row.into())
    }

    /// Replace a look's fields and product selection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the look does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: LookbookId,
        input: &LookbookInput,
    ) -> Result<Lookbook, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LookbookRow>(
            r"
            UPDATE shop.lookbook
            SET title = $2, slug = $3, description = $4, image = $5,
                display_order = $6, is_active = $7
            WHERE id = $1
            RETURNING id, title, slug, description, image, display_order, is_active,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(input.description.as_deref())
        .bind(input.image.as_ref().map(Json))
        .bind(input.display_order)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "lookbook slug"))?
        .ok_or(RepositoryError::NotFound)?;

        if let Some(product_ids) = &input.product_ids {
            assign_products(&mut tx, row.id, product_ids).await?;
        }
        tx.commit().await?;

        Ok(row.into())
    }

    /// Delete a look, returning it so its image can be removed. Its products
    /// stay in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the look does not exist.
    pub async fn delete(&self, id: LookbookId) -> Result<Lookbook, RepositoryError> {
        sqlx::query_as::<_, LookbookRow>(
            r"
            DELETE FROM shop.lookbook
            WHERE id = $1
            RETURNING id, title, slug, description, image, display_order, is_active,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Lookbook::from)
        .ok_or(RepositoryError::NotFound)
    }
}
