//! Order repository for database operations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use novare_core::checkout::LineItem;
use novare_core::{OrderId, OrderStatus, ProductId, UserId};

use super::{RepositoryError, parse_size};
use crate::models::{Order, PaymentResult, ShippingAddress};
use crate::services::payments::{PaymentLedger, PaymentRecord};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    payment_result: Option<Json<PaymentResult>>,
    items_price: Decimal,
    shipping_price: Decimal,
    total_price: Decimal,
    status: OrderStatus,
    paid_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            items,
            shipping_address: self.shipping_address.0,
            payment_method: self.payment_method,
            payment_result: self.payment_result.map(|json| json.0),
            items_price: self.items_price,
            shipping_price: self.shipping_price,
            total_price: self.total_price,
            status: self.status,
            paid_at: self.paid_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: i32,
    name: String,
    price: Decimal,
    quantity: i32,
    size: String,
}

impl TryFrom<OrderItemRow> for LineItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            size: parse_size(&row.size)?,
        })
    }
}

const ORDER_COLUMNS: &str = r"
    o.id, o.order_number, o.user_id, o.shipping_address, o.payment_method,
    o.payment_result, o.items_price, o.shipping_price, o.total_price, o.status,
    o.paid_at, o.delivered_at, o.created_at, o.updated_at
";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Attach line items to order rows, preserving row order.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, name, price, quantity, size
            FROM shop.order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<i32, Vec<LineItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            items.entry(order_id).or_default().push(row.try_into()?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect())
    }

    /// Get an order with its line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.with_items(vec![row]).await?.pop())
    }

    /// A user's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.order o
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order o ORDER BY o.created_at DESC, o.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// Set an order's status. Moving to `delivered` stamps `delivered_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE shop.order o
            SET status = $2,
                delivered_at = CASE WHEN $3 THEN COALESCE(o.delivered_at, NOW())
                                    ELSE o.delivered_at END
            WHERE o.id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .bind(status.stamps_delivery())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.with_items(vec![row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }
}

impl PaymentLedger for OrderRepository<'_> {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.get_by_id(id).await
    }

    async fn record_payment(
        &self,
        id: OrderId,
        result: PaymentResult,
    ) -> Result<PaymentRecord, RepositoryError> {
        // Only a pending order moves to processing; replays fall through to
        // the status lookup and change nothing.
        let updated = sqlx::query(
            r"
            UPDATE shop.order
            SET status = 'processing', payment_result = $2, paid_at = NOW()
            WHERE id = $1 AND status = 'pending'
            ",
        )
        .bind(id)
        .bind(Json(&result))
        .execute(self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            tracing::info!(order_id = %id, reference = %result.reference, "Payment recorded");
            return Ok(PaymentRecord::Recorded);
        }

        let status: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM shop.order WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(status.map_or(PaymentRecord::OrderNotFound, PaymentRecord::Unchanged))
    }
}
