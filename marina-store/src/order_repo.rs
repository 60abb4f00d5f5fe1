use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_order::{CartItem, CartRepository, Order, OrderItem, OrderRepository, OrderStatus, ProductReview};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use uuid::Uuid;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, merchant_id, status, \
     subtotal_cents, shipping_fee_cents, total_cents, \
     receiver_name, receiver_phone, receiver_address, \
     user_notes, merchant_notes, cancel_reason, payment_reference, carrier, tracking_number, \
     created_at, updated_at, paid_at, shipped_at, completed_at, cancelled_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    merchant_id: Uuid,
    status: String,
    subtotal_cents: i64,
    shipping_fee_cents: i64,
    total_cents: i64,
    receiver_name: String,
    receiver_phone: String,
    receiver_address: String,
    user_notes: Option<String>,
    merchant_notes: Option<String>,
    cancel_reason: Option<String>,
    payment_reference: Option<String>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit: String,
    quantity: i32,
    unit_price_cents: i64,
    total_cents: i64,
}

impl OrderItemRow {
    fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            unit: self.unit,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            total_cents: self.total_cents,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, CoreError> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            merchant_id: self.merchant_id,
            status: OrderStatus::from_str(&self.status)?,
            items,
            subtotal_cents: self.subtotal_cents,
            shipping_fee_cents: self.shipping_fee_cents,
            total_cents: self.total_cents,
            receiver_name: self.receiver_name,
            receiver_phone: self.receiver_phone,
            receiver_address: self.receiver_address,
            user_notes: self.user_notes,
            merchant_notes: self.merchant_notes,
            cancel_reason: self.cancel_reason,
            payment_reference: self.payment_reference,
            carrier: self.carrier,
            tracking_number: self.tracking_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl ReviewRow {
    fn into_review(self) -> ProductReview {
        ProductReview {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            user_id: self.user_id,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

impl PgOrderRepository {
    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, CoreError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, product_name, unit, quantity, unit_price_cents, total_cents \
             FROM order_items WHERE order_id = $1 ORDER BY product_name",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(OrderItemRow::into_item).collect())
    }

    async fn stale_or_missing(&self, id: Uuid, event: &'static str) -> CoreError {
        let current: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match current {
            Ok(Some((status,))) => CoreError::stale("order", event, status),
            Ok(None) => CoreError::not_found("order"),
            Err(err) => CoreError::storage(err),
        }
    }

    /// Deduct one line's stock inside the creation transaction; zero rows
    /// affected means the product is missing, delisted, or short.
    async fn deduct_stock(
        tx: &mut Transaction<'_, Postgres>,
        item: &OrderItem,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE products \
             SET stock = stock - $2, sales_count = sales_count + $2, \
                 status = CASE WHEN stock - $2 <= 0 THEN 'sold_out' ELSE status END, \
                 updated_at = $3 \
             WHERE id = $1 AND status = 'available' AND stock >= $2",
        )
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(CoreError::storage)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<(i32, String)> = sqlx::query_as("SELECT stock, status FROM products WHERE id = $1")
            .bind(item.product_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(CoreError::storage)?;
        match current {
            Some((stock, status)) if status == "available" => Err(CoreError::InsufficientStock {
                product_id: item.product_id,
                requested: item.quantity,
                available: stock,
            }),
            Some((_, _)) => Err(CoreError::Validation(format!(
                "product {} is not available",
                item.product_name
            ))),
            None => Err(CoreError::not_found("product")),
        }
    }

    async fn restore_stock(
        tx: &mut Transaction<'_, Postgres>,
        items: &[OrderItem],
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        for item in items {
            sqlx::query(
                "UPDATE products \
                 SET stock = stock + $2, sales_count = sales_count - $2, \
                     status = CASE WHEN status = 'sold_out' AND stock + $2 > 0 THEN 'available' ELSE status END, \
                     updated_at = $3 \
                 WHERE id = $1",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(CoreError::storage)?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: Order) -> Result<Order, CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let now = Utc::now();

        for item in &order.items {
            Self::deduct_stock(&mut tx, item, now).await?;
        }

        sqlx::query(
            "INSERT INTO orders ( \
                 id, order_number, user_id, merchant_id, status, \
                 subtotal_cents, shipping_fee_cents, total_cents, \
                 receiver_name, receiver_phone, receiver_address, \
                 user_notes, merchant_notes, cancel_reason, payment_reference, carrier, tracking_number, \
                 created_at, updated_at, paid_at, shipped_at, completed_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.merchant_id)
        .bind(order.status.as_str())
        .bind(order.subtotal_cents)
        .bind(order.shipping_fee_cents)
        .bind(order.total_cents)
        .bind(&order.receiver_name)
        .bind(&order.receiver_phone)
        .bind(&order.receiver_address)
        .bind(&order.user_notes)
        .bind(&order.merchant_notes)
        .bind(&order.cancel_reason)
        .bind(&order.payment_reference)
        .bind(&order.carrier)
        .bind(&order.tracking_number)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(order.shipped_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, product_name, unit, quantity, unit_price_cents, total_cents) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.unit)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.total_cents)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        }

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, CoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        match row {
            Some(row) => {
                let items = self.load_items(id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    async fn pay(&self, id: Uuid, payment_reference: &str, now: DateTime<Utc>) -> Result<Order, CoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders \
             SET status = 'paid', payment_reference = $2, paid_at = $3, updated_at = $3 \
             WHERE id = $1 AND status = 'pending_payment' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(payment_reference)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => {
                let items = self.load_items(id).await?;
                row.into_order(items)
            }
            None => Err(self.stale_or_missing(id, "pay").await),
        }
    }

    async fn ship(
        &self,
        id: Uuid,
        carrier: &str,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, CoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders \
             SET status = 'shipped', carrier = $2, tracking_number = $3, shipped_at = $4, updated_at = $4 \
             WHERE id = $1 AND status = 'paid' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(carrier)
        .bind(tracking_number)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => {
                let items = self.load_items(id).await?;
                row.into_order(items)
            }
            None => Err(self.stale_or_missing(id, "ship").await),
        }
    }

    async fn cancel(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Order, OrderStatus), CoreError> {
        let expected_strings: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders \
             SET status = 'cancelled', cancel_reason = $3, cancelled_at = $4, updated_at = $4 \
             WHERE id = $1 AND status = ANY($2) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(&expected_strings)
        .bind(reason)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        let row = match row {
            Some(row) => row,
            None => {
                drop(tx);
                return Err(self.stale_or_missing(id, "cancel").await);
            }
        };

        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, product_name, unit, quantity, unit_price_cents, total_cents \
             FROM order_items WHERE order_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(CoreError::storage)?;
        let items: Vec<OrderItem> = item_rows.into_iter().map(OrderItemRow::into_item).collect();

        // Released stock goes back in the same transaction as the
        // cancellation itself.
        Self::restore_stock(&mut tx, &items, now).await?;
        tx.commit().await.map_err(CoreError::storage)?;

        let previous = if expected.len() == 1 {
            expected[0]
        } else if row.paid_at.is_some() {
            OrderStatus::Paid
        } else {
            OrderStatus::PendingPayment
        };
        Ok((row.into_order(items)?, previous))
    }

    async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Order, CoreError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders \
             SET status = 'completed', completed_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'shipped' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => {
                let items = self.load_items(id).await?;
                row.into_order(items)
            }
            None => Err(self.stale_or_missing(id, "complete").await),
        }
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }

    async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE merchant_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(merchant_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.load_items(row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }

    async fn insert_review(&self, review: ProductReview) -> Result<ProductReview, CoreError> {
        let row: Option<ReviewRow> = sqlx::query_as(
            "INSERT INTO product_reviews (id, order_id, product_id, user_id, rating, comment, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (order_id, product_id) DO NOTHING \
             RETURNING id, order_id, product_id, user_id, rating, comment, created_at",
        )
        .bind(review.id)
        .bind(review.order_id)
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        match row {
            Some(row) => Ok(row.into_review()),
            None => Err(CoreError::Validation("product already reviewed for this order".into())),
        }
    }

    async fn reviews_for_product(&self, product_id: Uuid) -> Result<Vec<ProductReview>, CoreError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, user_id, rating, comment, created_at \
             FROM product_reviews WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(ReviewRow::into_review).collect())
    }
}

pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl CartRow {
    fn into_item(self) -> CartItem {
        CartItem {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            quantity: self.quantity,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem, CoreError> {
        let row: CartRow = sqlx::query_as(
            "INSERT INTO cart_items (id, user_id, product_id, quantity, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, product_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             RETURNING id, user_id, product_id, quantity, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(row.into_item())
    }

    async fn remove(&self, user_id: Uuid, item_id: Uuid) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<CartItem>, CoreError> {
        let rows: Vec<CartRow> = sqlx::query_as(
            "SELECT id, user_id, product_id, quantity, created_at \
             FROM cart_items WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(CartRow::into_item).collect())
    }

    async fn take(&self, user_id: Uuid, item_ids: &[Uuid]) -> Result<Vec<CartItem>, CoreError> {
        let ids: Vec<Uuid> = item_ids.to_vec();
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let rows: Vec<CartRow> = sqlx::query_as(
            "SELECT id, user_id, product_id, quantity, created_at \
             FROM cart_items WHERE user_id = $1 AND id = ANY($2) FOR UPDATE",
        )
        .bind(user_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        if rows.len() != item_ids.len() {
            return Err(CoreError::Validation("cart item not found".into()));
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id)
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(CartRow::into_item).collect())
    }
}
