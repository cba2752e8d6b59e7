//! Integration test support for Novare.
//!
//! Order placement and payment verification are written against the
//! [`CheckoutStore`], [`PaymentLedger`] and [`PaymentGateway`] traits. This
//! crate provides in-memory implementations so their end-to-end behavior can
//! be tested without `PostgreSQL` or Paystack:
//!
//! - [`MemoryStore`] - users, catalog, carts and orders behind one lock, with
//!   the same all-or-nothing commit as the database store
//! - [`StubGateway`] - canned transactions keyed by reference
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p novare-integration-tests
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Barrier, Mutex};

use novare_api::db::RepositoryError;
use novare_api::models::{NewOrder, Order, PaymentResult};
use novare_api::services::checkout::{CheckoutStore, CommitError};
use novare_api::services::payments::{
    Authorization, GatewayError, InitializeTransaction, PaymentGateway, PaymentLedger,
    PaymentRecord, VerifiedTransaction,
};
use novare_core::checkout::{CartEntry, CatalogProduct};
use novare_core::{CartLineId, OrderId, OrderStatus, ProductId, Size, UserId};

#[derive(Debug, Clone)]
struct CartRow {
    line_id: CartLineId,
    product_id: ProductId,
    quantity: i32,
    size: Size,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<UserId>,
    products: BTreeMap<ProductId, CatalogProduct>,
    carts: HashMap<UserId, Vec<CartRow>>,
    orders: BTreeMap<OrderId, Order>,
    /// Successful `pending` to `processing` moves per order.
    payments: HashMap<OrderId, usize>,
    next_line: i32,
    next_order: i32,
}

/// In-memory checkout store and payment ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    commit_gate: Option<Barrier>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every commit until `parties` commits are waiting, so concurrent
    /// checkouts all plan against the same stock before any of them writes.
    #[must_use]
    pub fn with_commit_gate(parties: usize) -> Self {
        Self {
            commit_gate: Some(Barrier::new(parties)),
            ..Self::default()
        }
    }

    pub async fn add_user(&self, id: i32) -> UserId {
        let id = UserId::new(id);
        self.state.lock().await.users.push(id);
        id
    }

    pub async fn add_product(&self, id: i32, name: &str, price: Decimal, stock: i32) -> ProductId {
        let id = ProductId::new(id);
        self.state.lock().await.products.insert(
            id,
            CatalogProduct {
                name: name.to_owned(),
                price,
                stock,
            },
        );
        id
    }

    pub async fn remove_product(&self, id: ProductId) {
        self.state.lock().await.products.remove(&id);
    }

    pub async fn set_price(&self, id: ProductId, price: Decimal) {
        if let Some(product) = self.state.lock().await.products.get_mut(&id) {
            product.price = price;
        }
    }

    /// Current stock, or `None` for an unknown product.
    pub async fn stock(&self, id: ProductId) -> Option<i32> {
        self.state.lock().await.products.get(&id).map(|p| p.stock)
    }

    pub async fn add_to_cart(
        &self,
        user: UserId,
        product_id: ProductId,
        quantity: i32,
        size: Size,
    ) -> CartLineId {
        let mut state = self.state.lock().await;
        state.next_line += 1;
        let line_id = CartLineId::new(state.next_line);
        state.carts.entry(user).or_default().push(CartRow {
            line_id,
            product_id,
            quantity,
            size,
        });
        line_id
    }

    /// `(product, quantity, size)` for each line of the user's cart.
    pub async fn cart(&self, user: UserId) -> Vec<(ProductId, i32, Size)> {
        self.state
            .lock()
            .await
            .carts
            .get(&user)
            .map(|rows| {
                rows.iter()
                    .map(|r| (r.product_id, r.quantity, r.size))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Overwrite the quantity of an existing cart line.
    pub async fn set_cart_quantity(&self, user: UserId, line_id: CartLineId, quantity: i32) {
        if let Some(row) = self
            .state
            .lock()
            .await
            .carts
            .get_mut(&user)
            .and_then(|rows| rows.iter_mut().find(|r| r.line_id == line_id))
        {
            row.quantity = quantity;
        }
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.values().cloned().collect()
    }

    /// How many times the order moved from `pending` to `processing`.
    pub async fn payment_transitions(&self, id: OrderId) -> usize {
        self.state
            .lock()
            .await
            .payments
            .get(&id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set_status(&self, id: OrderId, status: OrderStatus) {
        if let Some(order) = self.state.lock().await.orders.get_mut(&id) {
            order.status = status;
        }
    }
}

impl CheckoutStore for MemoryStore {
    async fn load_cart(&self, user_id: UserId) -> Result<Option<Vec<CartEntry>>, RepositoryError> {
        let state = self.state.lock().await;
        if !state.users.contains(&user_id) {
            return Ok(None);
        }

        let entries = state
            .carts
            .get(&user_id)
            .into_iter()
            .flatten()
            .map(|row| CartEntry {
                line_id: row.line_id,
                product_id: row.product_id,
                quantity: row.quantity,
                size: row.size,
                product: state.products.get(&row.product_id).cloned(),
            })
            .collect();
        Ok(Some(entries))
    }

    async fn commit_order(&self, order: NewOrder) -> Result<Order, CommitError> {
        if let Some(gate) = &self.commit_gate {
            gate.wait().await;
        }

        let mut state = self.state.lock().await;

        // The planned lines must still be in the cart, unchanged
        let rows = state.carts.get(&order.user_id).map(Vec::as_slice).unwrap_or_default();
        let unchanged = order.plan.cart_lines.iter().all(|line| {
            rows.iter()
                .any(|row| row.line_id == line.line_id && row.quantity == line.quantity)
        });
        if !unchanged {
            return Err(CommitError::CartChanged);
        }

        // Check every reservation before touching anything
        for reservation in &order.plan.reservations {
            let product = state
                .products
                .get(&reservation.product_id)
                .ok_or(CommitError::ProductNotFound(reservation.product_id))?;
            if product.stock < reservation.quantity {
                return Err(CommitError::InsufficientStock {
                    product_id: reservation.product_id,
                    name: reservation.name.clone(),
                });
            }
        }

        for reservation in &order.plan.reservations {
            if let Some(product) = state.products.get_mut(&reservation.product_id) {
                product.stock -= reservation.quantity;
            }
        }
        if let Some(rows) = state.carts.get_mut(&order.user_id) {
            rows.retain(|row| {
                !order
                    .plan
                    .cart_lines
                    .iter()
                    .any(|line| line.line_id == row.line_id)
            });
        }

        state.next_order += 1;
        let now = Utc::now();
        let placed = Order {
            id: OrderId::new(state.next_order),
            order_number: order.order_number,
            user_id: order.user_id,
            items: order.plan.items,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            payment_result: None,
            items_price: order.plan.items_price,
            shipping_price: order.plan.shipping_price,
            total_price: order.plan.total_price,
            status: OrderStatus::Pending,
            paid_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(placed.id, placed.clone());
        Ok(placed)
    }
}

impl PaymentLedger for MemoryStore {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn record_payment(
        &self,
        id: OrderId,
        result: PaymentResult,
    ) -> Result<PaymentRecord, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(order) = state.orders.get_mut(&id) else {
            return Ok(PaymentRecord::OrderNotFound);
        };
        if order.status != OrderStatus::Pending {
            return Ok(PaymentRecord::Unchanged(order.status));
        }

        let now = Utc::now();
        order.status = OrderStatus::Processing;
        order.payment_result = Some(result);
        order.paid_at = Some(now);
        order.updated_at = now;
        *state.payments.entry(id).or_default() += 1;
        Ok(PaymentRecord::Recorded)
    }
}

/// Payment gateway answering from canned transactions.
#[derive(Debug, Default)]
pub struct StubGateway {
    transactions: Mutex<HashMap<String, VerifiedTransaction>>,
    initialized: Mutex<Vec<InitializeTransaction>>,
    verify_calls: AtomicUsize,
}

impl StubGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transaction the gateway will report for `reference`.
    pub async fn add_transaction(
        &self,
        reference: &str,
        status: &str,
        order_id: Option<OrderId>,
        amount: i64,
    ) {
        self.transactions.lock().await.insert(
            reference.to_owned(),
            VerifiedTransaction {
                id: format!("txn_{reference}"),
                status: status.to_owned(),
                reference: reference.to_owned(),
                amount,
                email: Some("shopper@novare.store".to_owned()),
                order_id,
            },
        );
    }

    /// Transactions opened so far.
    pub async fn initialized(&self) -> Vec<InitializeTransaction> {
        self.initialized.lock().await.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for StubGateway {
    async fn initialize(
        &self,
        request: &InitializeTransaction,
    ) -> Result<Authorization, GatewayError> {
        self.initialized.lock().await.push(request.clone());
        let reference = format!("ref_{}", request.order_id);
        Ok(Authorization {
            authorization_url: format!("https://checkout.paystack.test/{reference}"),
            access_code: format!("access_{reference}"),
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .lock()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected("Transaction reference not found".to_owned()))
    }
}
