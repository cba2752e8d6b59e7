//! Cart repository for database operations.

use sqlx::PgPool;

use novare_core::{CartLineId, ProductId, Size, UserId};

use super::products::ProductRow;
use super::{RepositoryError, parse_size};
use crate::models::{CartLine, Product};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CartLineRow {
    line_id: i32,
    quantity: i32,
    line_size: String,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CartLineId::new(row.line_id),
            product: Product::try_from(row.product)?,
            quantity: row.quantity,
            size: parse_size(&row.line_size)?,
        })
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's cart lines with their products, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT cl.id AS line_id, cl.quantity, cl.size AS line_size,
                   p.id, p.name, p.slug, p.description, p.price, p.stock, p.category,
                   p.sizes, p.images, p.lookbook_id, p.is_featured, p.created_at,
                   p.updated_at
            FROM shop.cart_line cl
            JOIN shop.product p ON p.id = cl.product_id
            WHERE cl.user_id = $1
            ORDER BY cl.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(CartLine::try_from)
        .collect()
    }

    /// Add to the line for `(product, size)`, creating it if needed.
    ///
    /// Stock is not checked here. The merged quantity is capped at
    /// [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: Size,
        quantity: i32,
    ) -> Result<CartLineId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.cart_line (user_id, product_id, size, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id, size)
            DO UPDATE SET quantity = LEAST(shop.cart_line.quantity + EXCLUDED.quantity, $5)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(size.label())
        .bind(quantity.min(MAX_LINE_QUANTITY))
        .bind(MAX_LINE_QUANTITY)
        .fetch_one(self.pool)
        .await?;

        Ok(CartLineId::new(id))
    }

    /// Set the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such line.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.cart_line SET quantity = $3 WHERE id = $2 AND user_id = $1",
        )
        .bind(user_id)
        .bind(line_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove one of the user's lines. Removing an unknown line is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, line_id: CartLineId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_line WHERE id = $2 AND user_id = $1")
            .bind(user_id)
            .bind(line_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Empty the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_line WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
