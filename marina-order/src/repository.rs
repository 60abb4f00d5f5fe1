use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use uuid::Uuid;

use crate::models::{CartItem, Order, OrderStatus, ProductReview};

/// Data access for orders. Creation decrements product stock in the same
/// atomic unit as the insert; cancellation restores it the same way.
/// Every transition is a compare-and-set against the stored status.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert the order and its line items, deducting stock for each line
    /// all-or-nothing. Fails with `InsufficientStock` (stock untouched)
    /// when any line exceeds availability.
    async fn create(&self, order: Order) -> Result<Order, CoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, CoreError>;

    /// PendingPayment -> Paid, recording the processor reference.
    async fn pay(&self, id: Uuid, payment_reference: &str, now: DateTime<Utc>) -> Result<Order, CoreError>;

    /// Paid -> Shipped with carrier metadata.
    async fn ship(
        &self,
        id: Uuid,
        carrier: &str,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, CoreError>;

    /// Transition to Cancelled from the expected status, restoring the
    /// reserved stock; returns the updated order and the status it left.
    async fn cancel(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Order, OrderStatus), CoreError>;

    /// Shipped -> Completed.
    async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Order, CoreError>;

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError>;

    async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError>;

    /// One review per (order, product); duplicates are rejected.
    async fn insert_review(&self, review: ProductReview) -> Result<ProductReview, CoreError>;

    async fn reviews_for_product(&self, product_id: Uuid) -> Result<Vec<ProductReview>, CoreError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Add a line to the user's cart, merging quantity with an existing
    /// line for the same product.
    async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem, CoreError>;

    async fn remove(&self, user_id: Uuid, item_id: Uuid) -> Result<bool, CoreError>;

    async fn list(&self, user_id: Uuid) -> Result<Vec<CartItem>, CoreError>;

    /// Fetch and delete the selected lines; order creation consumes the
    /// cart this way.
    async fn take(&self, user_id: Uuid, item_ids: &[Uuid]) -> Result<Vec<CartItem>, CoreError>;
}

pub fn new_cart_item(user_id: Uuid, product_id: Uuid, quantity: i32) -> CartItem {
    CartItem {
        id: Uuid::new_v4(),
        user_id,
        product_id,
        quantity,
        created_at: Utc::now(),
    }
}
