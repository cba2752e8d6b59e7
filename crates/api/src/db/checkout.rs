//! Transactional checkout against `PostgreSQL`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use novare_core::checkout::{CartEntry, ConsumedLine, StockReservation};
use novare_core::{OrderId, OrderStatus, UserId};

use super::RepositoryError;
use super::cart::CartRepository;
use crate::models::{NewOrder, Order};
use crate::services::checkout::{CheckoutStore, CommitError};

/// [`CheckoutStore`] backed by the `shop` schema.
pub struct CheckoutRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutRepository<'a> {
    /// Create a new checkout repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InsertedOrder {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LockedLine {
    id: i32,
    quantity: i32,
}

/// Lock the user's cart lines and check the planned ones are still there
/// with the planned quantities.
///
/// A second checkout of the same cart blocks here until the first commits,
/// then sees its lines gone.
async fn claim_cart_lines(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    planned: &[ConsumedLine],
) -> Result<Vec<i32>, CommitError> {
    let locked = sqlx::query_as::<_, LockedLine>(
        "SELECT id, quantity FROM shop.cart_line WHERE user_id = $1 ORDER BY id FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(RepositoryError::from)?;

    let unchanged = planned.iter().all(|line| {
        locked
            .iter()
            .any(|row| row.id == line.line_id.as_i32() && row.quantity == line.quantity)
    });
    if !unchanged {
        return Err(CommitError::CartChanged);
    }

    Ok(planned.iter().map(|line| line.line_id.as_i32()).collect())
}

/// Take a reservation out of stock, failing if it is no longer covered.
async fn reserve(
    tx: &mut Transaction<'_, Postgres>,
    reservation: &StockReservation,
) -> Result<(), CommitError> {
    let updated = sqlx::query(
        "UPDATE shop.product SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
    )
    .bind(reservation.product_id)
    .bind(reservation.quantity)
    .execute(&mut **tx)
    .await
    .map_err(RepositoryError::from)?;

    if updated.rows_affected() == 1 {
        return Ok(());
    }

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.product WHERE id = $1)")
            .bind(reservation.product_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(RepositoryError::from)?;

    if exists {
        Err(CommitError::InsufficientStock {
            product_id: reservation.product_id,
            name: reservation.name.clone(),
        })
    } else {
        Err(CommitError::ProductNotFound(reservation.product_id))
    }
}

impl CheckoutStore for CheckoutRepository<'_> {
    async fn load_cart(&self, user_id: UserId) -> Result<Option<Vec<CartEntry>>, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.user WHERE id = $1)")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        if !exists {
            return Ok(None);
        }

        let lines = CartRepository::new(self.pool).list(user_id).await?;
        Ok(Some(lines.iter().map(|line| line.entry()).collect()))
    }

    async fn commit_order(&self, order: NewOrder) -> Result<Order, CommitError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let plan = &order.plan;

        let line_ids = claim_cart_lines(&mut tx, order.user_id, &plan.cart_lines).await?;

        // Reservations arrive sorted by product id, so row locks are taken in
        // a consistent order across concurrent checkouts.
        for reservation in &plan.reservations {
            reserve(&mut tx, reservation).await?;
        }

        let inserted = sqlx::query_as::<_, InsertedOrder>(
            r"
            INSERT INTO shop.order
                (order_number, user_id, shipping_address, payment_method,
                 items_price, shipping_price, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING id, created_at, updated_at
            ",
        )
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(plan.items_price)
        .bind(plan.shipping_price)
        .bind(plan.total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| super::conflict_on_unique(e, "order number"))?;

        for (position, item) in (0_i32..).zip(&plan.items) {
            sqlx::query(
                r"
                INSERT INTO shop.order_item
                    (order_id, position, product_id, name, price, quantity, size)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(inserted.id)
            .bind(position)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.size.label())
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        }

        let deleted = sqlx::query("DELETE FROM shop.cart_line WHERE user_id = $1 AND id = ANY($2)")
            .bind(order.user_id)
            .bind(&line_ids)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        if usize::try_from(deleted.rows_affected()).ok() != Some(line_ids.len()) {
            return Err(CommitError::CartChanged);
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        let NewOrder {
            order_number,
            user_id,
            shipping_address,
            payment_method,
            plan,
        } = order;

        Ok(Order {
            id: OrderId::new(inserted.id),
            order_number,
            user_id,
            items: plan.items,
            shipping_address,
            payment_method,
            payment_result: None,
            items_price: plan.items_price,
            shipping_price: plan.shipping_price,
            total_price: plan.total_price,
            status: OrderStatus::Pending,
            paid_at: None,
            delivered_at: None,
            created_at: inserted.created_at,
            updated_at: inserted.updated_at,
        })
    }
}
