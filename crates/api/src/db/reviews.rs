//! Review repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use novare_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Review, ReviewInput};

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    username: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            product_id: ProductId::new(row.product_id),
            user_id: UserId::new(row.user_id),
            username: row.username,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.username, r.rating, r.comment,
                   r.created_at, r.updated_at
            FROM shop.review r
            JOIN shop.user u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.username, r.rating, r.comment,
                   r.created_at, r.updated_at
            FROM shop.review r
            JOIN shop.user u ON u.id = r.user_id
            WHERE r.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Review::from))
    }

    /// Write a user's review of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed it.
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        input: &ReviewInput,
    ) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, ReviewRow>(
            r"
            WITH inserted AS (
                INSERT INTO shop.review (product_id, user_id, rating, comment)
                SELECT p.id, $2, $3, $4 FROM shop.product p WHERE p.id = $1
                RETURNING id, product_id, user_id, rating, comment, created_at, updated_at
            )
            SELECT i.id, i.product_id, i.user_id, u.username, i.rating, i.comment,
                   i.created_at, i.updated_at
            FROM inserted i
            JOIN shop.user u ON u.id = i.user_id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "review for this product"))?
        .map(Review::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace a review's rating and comment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn update(&self, id: ReviewId, input: &ReviewInput) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, ReviewRow>(
            r"
            WITH updated AS (
                UPDATE shop.review SET rating = $2, comment = $3
                WHERE id = $1
                RETURNING id, product_id, user_id, rating, comment, created_at, updated_at
            )
            SELECT r.id, r.product_id, r.user_id, u.username, r.rating, r.comment,
                   r.created_at, r.updated_at
            FROM updated r
            JOIN shop.user u ON u.id = r.user_id
            ",
        )
        .bind(id)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_optional(self.pool)
        .await?
        .map(Review::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.review WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
