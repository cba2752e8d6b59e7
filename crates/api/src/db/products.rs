//! Product repository for database operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use novare_core::{Category, LookbookId, ProductId};

use super::{RepositoryError, conflict_on_unique, parse_size};
use crate::models::{HostedImage, Product, ProductFilter, ProductInput, ProductPage};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    stock: i32,
    category: Category,
    sizes: Vec<String>,
    images: Json<Vec<HostedImage>>,
    lookbook_id: Option<i32>,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let mut sizes = row
            .sizes
            .iter()
            .map(|label| parse_size(label))
            .collect::<Result<Vec<_>, _>>()?;
        sizes.sort();

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            price: row.price,
            stock: row.stock,
            category: row.category,
            sizes,
            images: row.images.0,
            lookbook_id: row.lookbook_id.map(LookbookId::new),
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Escape `LIKE` wildcards so search text matches literally.
fn escape_like(search: &str) -> String {
    search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Repository for catalog database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, newest first, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<ProductPage, RepositoryError> {
        let search = filter.search.as_deref().map(escape_like);

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM shop.product
            WHERE ($1::shop.product_category IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
              AND ($3::boolean IS NULL OR is_featured = $3)
            ",
        )
        .bind(filter.category)
        .bind(search.as_deref())
        .bind(filter.featured)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, stock, category, sizes, images,
                   lookbook_id, is_featured, created_at, updated_at
            FROM shop.product
            WHERE ($1::shop.product_category IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
              AND ($3::boolean IS NULL OR is_featured = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            ",
        )
        .bind(filter.category)
        .bind(search.as_deref())
        .bind(filter.featured)
        .bind(i64::from(filter.limit))
        .bind(filter.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(ProductPage::new(into_products(rows)?, total, filter))
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, stock, category, sizes, images,
                   lookbook_id, is_featured, created_at, updated_at
            FROM shop.product
            WHERE slug = $1
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, stock, category, sizes, images,
                   lookbook_id, is_featured, created_at, updated_at
            FROM shop.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    /// Products that appear in any look, grouped by look.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_in_lookbooks(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, stock, category, sizes, images,
                   lookbook_id, is_featured, created_at, updated_at
            FROM shop.product
            WHERE lookbook_id IS NOT NULL
            ORDER BY lookbook_id, id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Every product, newest first, for the admin catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, price, stock, category, sizes, images,
                   lookbook_id, is_featured, created_at, updated_at
            FROM shop.product
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let sizes: Vec<String> = input.sizes.iter().map(ToString::to_string).collect();

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO shop.product
                (name, slug, description, price, stock, category, sizes, images,
                 lookbook_id, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, name, slug, description, price, stock, category, sizes, images,
                      lookbook_id, is_featured, created_at, updated_at
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category)
        .bind(&sizes)
        .bind(Json(&input.images))
        .bind(input.lookbook_id)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug"))?;

        row.try_into()
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let sizes: Vec<String> = input.sizes.iter().map(ToString::to_string).collect();

        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE shop.product
            SET name = $2, slug = $3, description = $4, price = $5, stock = $6,
                category = $7, sizes = $8, images = $9, lookbook_id = $10,
                is_featured = $11
            WHERE id = $1
            RETURNING id, name, slug, description, price, stock, category, sizes, images,
                      lookbook_id, is_featured, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category)
        .bind(&sizes)
        .bind(Json(&input.images))
        .bind(input.lookbook_id)
        .bind(input.is_featured)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a product, returning it so its hosted images can be removed.
    ///
    /// Past orders keep their snapshotted line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            DELETE FROM shop.product
            WHERE id = $1
            RETURNING id, name, slug, description, price, stock, category, sizes, images,
                      lookbook_id, is_featured, created_at, updated_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("tee"), "tee");
        assert_eq!(escape_like("100%_cotton\\"), "100\\%\\_cotton\\\\");
    }
}
