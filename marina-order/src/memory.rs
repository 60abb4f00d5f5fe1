use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_catalog::InMemoryProductDirectory;
use marina_core::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{CartItem, Order, OrderStatus, ProductReview};
use crate::repository::{new_cart_item, CartRepository, OrderRepository};

/// In-memory order repository. Shares the product directory so stock
/// deduction and restoration mutate the same rows the catalog serves,
/// mirroring the single-database arrangement of the Postgres
/// implementation.
#[derive(Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
    reviews: Arc<RwLock<HashMap<(Uuid, Uuid), ProductReview>>>,
    products: InMemoryProductDirectory,
}

impl InMemoryOrderRepository {
    pub fn new(products: InMemoryProductDirectory) -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            reviews: Arc::new(RwLock::new(HashMap::new())),
            products,
        }
    }
}

fn stale(event: &'static str, actual: OrderStatus) -> CoreError {
    CoreError::stale("order", event, actual.as_str())
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: Order) -> Result<Order, CoreError> {
        // Deduct line by line, rolling back already-deducted lines if a
        // later one fails, so a partial failure leaves stock unchanged.
        let mut deducted: Vec<(Uuid, i32)> = Vec::new();
        for item in &order.items {
            match self.products.deduct(item.product_id, item.quantity).await {
                Ok(()) => deducted.push((item.product_id, item.quantity)),
                Err(err) => {
                    for (product_id, quantity) in deducted {
                        let _ = self.products.restore(product_id, quantity).await;
                    }
                    return Err(err);
                }
            }
        }
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, CoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn pay(&self, id: Uuid, payment_reference: &str, now: DateTime<Utc>) -> Result<Order, CoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| CoreError::not_found("order"))?;
        if order.status != OrderStatus::PendingPayment {
            return Err(stale("pay", order.status));
        }
        order.status = OrderStatus::Paid;
        order.payment_reference = Some(payment_reference.to_string());
        order.paid_at = Some(now);
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn ship(
        &self,
        id: Uuid,
        carrier: &str,
        tracking_number: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, CoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| CoreError::not_found("order"))?;
        if order.status != OrderStatus::Paid {
            return Err(stale("ship", order.status));
        }
        order.status = OrderStatus::Shipped;
        order.carrier = Some(carrier.to_string());
        order.tracking_number = tracking_number.map(|t| t.to_string());
        order.shipped_at = Some(now);
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn cancel(
        &self,
        id: Uuid,
        expected: &[OrderStatus],
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Order, OrderStatus), CoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| CoreError::not_found("order"))?;
        if !expected.contains(&order.status) {
            return Err(stale("cancel", order.status));
        }
        let previous = order.status;
        order.status = OrderStatus::Cancelled;
        order.cancel_reason = Some(reason.to_string());
        order.cancelled_at = Some(now);
        order.updated_at = now;
        let order = order.clone();
        drop(orders);

        for item in &order.items {
            let _ = self.products.restore(item.product_id, item.quantity).await;
        }
        Ok((order, previous))
    }

    async fn complete(&self, id: Uuid, now: DateTime<Utc>) -> Result<Order, CoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or_else(|| CoreError::not_found("order"))?;
        if order.status != OrderStatus::Shipped {
            return Err(stale("complete", order.status));
        }
        order.status = OrderStatus::Completed;
        order.completed_at = Some(now);
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| o.merchant_id == merchant_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn insert_review(&self, review: ProductReview) -> Result<ProductReview, CoreError> {
        let mut reviews = self.reviews.write().await;
        let key = (review.order_id, review.product_id);
        if reviews.contains_key(&key) {
            return Err(CoreError::Validation("product already reviewed for this order".into()));
        }
        reviews.insert(key, review.clone());
        Ok(review)
    }

    async fn reviews_for_product(&self, product_id: Uuid) -> Result<Vec<ProductReview>, CoreError> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCartRepository {
    items: Arc<RwLock<HashMap<Uuid, CartItem>>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem, CoreError> {
        let mut items = self.items.write().await;
        if let Some(existing) = items
            .values_mut()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
        {
            existing.quantity += quantity;
            return Ok(existing.clone());
        }
        let item = new_cart_item(user_id, product_id, quantity);
        items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn remove(&self, user_id: Uuid, item_id: Uuid) -> Result<bool, CoreError> {
        let mut items = self.items.write().await;
        match items.get(&item_id) {
            Some(item) if item.user_id == user_id => {
                items.remove(&item_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<CartItem>, CoreError> {
        let items = self.items.read().await;
        let mut matching: Vec<CartItem> = items.values().filter(|i| i.user_id == user_id).cloned().collect();
        matching.sort_by_key(|i| i.created_at);
        Ok(matching)
    }

    async fn take(&self, user_id: Uuid, item_ids: &[Uuid]) -> Result<Vec<CartItem>, CoreError> {
        let mut items = self.items.write().await;
        let mut taken = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            match items.get(item_id) {
                Some(item) if item.user_id == user_id => taken.push(item.clone()),
                _ => return Err(CoreError::Validation("cart item not found".into())),
            }
        }
        for item in &taken {
            items.remove(&item.id);
        }
        Ok(taken)
    }
}
