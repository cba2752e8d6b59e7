//! Wishlist repository for database operations.

use sqlx::PgPool;

use novare_core::{ProductId, UserId};

use super::RepositoryError;
use super::products::{ProductRow, into_products};
use crate::models::Product;

/// Repository for saved products.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Products the user has saved, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.slug, p.description, p.price, p.stock, p.category,
                   p.sizes, p.images, p.lookbook_id, p.is_featured, p.created_at,
                   p.updated_at
            FROM shop.wishlist_item w
            JOIN shop.product p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.created_at DESC, p.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Save a product. Saving it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO shop.wishlist_item (user_id, product_id)
            SELECT $1, p.id FROM shop.product p WHERE p.id = $2
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.product WHERE id = $1)")
                    .bind(product_id)
                    .fetch_one(self.pool)
                    .await?;
            if !exists {
                return Err(RepositoryError::NotFound);
            }
        }
        Ok(())
    }

    /// Unsave a product. Removing an unsaved product is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.wishlist_item WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
