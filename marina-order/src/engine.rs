use chrono::Utc;
use marina_catalog::ProductDirectory;
use marina_core::{AccountDirectory, Actor, CoreError, NotificationPublisher, PaymentAdapter, PaymentStatus};
use marina_ledger::{SettlementLedger, SplitKind};
use marina_shared::events::{NotificationEvent, NotificationKind};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{CartItem, Order, OrderItem, OrderPolicy, OrderStatus, ProductReview, ShippingDetails};
use crate::repository::{CartRepository, OrderRepository};

/// The Order Engine: cart -> order -> payment -> fulfillment. Stock moves
/// with the order inside the repository's atomic unit; price and name are
/// snapshotted onto line items at creation and never recomputed.
pub struct OrderEngine {
    orders: Arc<dyn OrderRepository>,
    cart: Arc<dyn CartRepository>,
    products: Arc<dyn ProductDirectory>,
    accounts: Arc<dyn AccountDirectory>,
    ledger: Arc<SettlementLedger>,
    payments: Arc<dyn PaymentAdapter>,
    notifier: Arc<dyn NotificationPublisher>,
    policy: OrderPolicy,
}

impl OrderEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        cart: Arc<dyn CartRepository>,
        products: Arc<dyn ProductDirectory>,
        accounts: Arc<dyn AccountDirectory>,
        ledger: Arc<SettlementLedger>,
        payments: Arc<dyn PaymentAdapter>,
        notifier: Arc<dyn NotificationPublisher>,
        policy: OrderPolicy,
    ) -> Self {
        Self {
            orders,
            cart,
            products,
            accounts,
            ledger,
            payments,
            notifier,
            policy,
        }
    }

    // ------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------

    pub async fn add_to_cart(&self, actor: &Actor, product_id: Uuid, quantity: i32) -> Result<CartItem, CoreError> {
        if quantity < 1 {
            return Err(CoreError::Validation("quantity must be at least 1".into()));
        }
        let product = self
            .products
            .product(product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("product"))?;
        if !product.is_sellable() {
            return Err(CoreError::Validation(format!("product {} is not available", product.name)));
        }
        self.cart.add(actor.user_id, product_id, quantity).await
    }

    pub async fn remove_from_cart(&self, actor: &Actor, item_id: Uuid) -> Result<(), CoreError> {
        if self.cart.remove(actor.user_id, item_id).await? {
            Ok(())
        } else {
            Err(CoreError::not_found("cart item"))
        }
    }

    pub async fn cart_items(&self, actor: &Actor) -> Result<Vec<CartItem>, CoreError> {
        self.cart.list(actor.user_id).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create an order from selected cart lines. The lines are consumed
    /// from the cart; quantities for the same product merge.
    pub async fn create_from_cart(
        &self,
        actor: &Actor,
        item_ids: Vec<Uuid>,
        shipping: ShippingDetails,
    ) -> Result<Order, CoreError> {
        if item_ids.is_empty() {
            return Err(CoreError::Validation("no cart items selected".into()));
        }
        let items = self.cart.take(actor.user_id, &item_ids).await?;
        let mut lines: HashMap<Uuid, i32> = HashMap::new();
        for item in items {
            *lines.entry(item.product_id).or_insert(0) += item.quantity;
        }
        self.build_order(actor, lines.into_iter().collect(), shipping).await
    }

    /// Buy-it-now path: a single product straight to an order.
    pub async fn create_direct(
        &self,
        actor: &Actor,
        product_id: Uuid,
        quantity: i32,
        shipping: ShippingDetails,
    ) -> Result<Order, CoreError> {
        self.build_order(actor, vec![(product_id, quantity)], shipping).await
    }

    async fn build_order(
        &self,
        actor: &Actor,
        lines: Vec<(Uuid, i32)>,
        shipping: ShippingDetails,
    ) -> Result<Order, CoreError> {
        if lines.is_empty() {
            return Err(CoreError::Validation("order has no line items".into()));
        }

        let mut merchant_id: Option<Uuid> = None;
        let mut snapshots = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            if quantity < 1 {
                return Err(CoreError::Validation("quantity must be at least 1".into()));
            }
            let product = self
                .products
                .product(product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("product"))?;
            if !product.is_sellable() {
                return Err(CoreError::Validation(format!("product {} is not available", product.name)));
            }
            match merchant_id {
                None => merchant_id = Some(product.merchant_id),
                Some(existing) if existing != product.merchant_id => {
                    return Err(CoreError::Validation(
                        "an order may only contain items from a single merchant".into(),
                    ));
                }
                Some(_) => {}
            }
            snapshots.push((product, quantity));
        }
        let merchant_id = merchant_id.expect("at least one line");

        let merchant = self
            .accounts
            .merchant(merchant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("merchant"))?;
        if !merchant.is_active() {
            return Err(CoreError::Validation("the product's merchant has not been approved".into()));
        }

        let subtotal: i64 = snapshots
            .iter()
            .map(|(p, q)| p.price_cents * *q as i64)
            .sum();
        let mut order = Order::new(
            actor.user_id,
            merchant_id,
            self.policy.shipping_fee_for(subtotal),
            shipping,
        );
        for (product, quantity) in snapshots {
            order.push_item(OrderItem::snapshot(
                order.id,
                product.id,
                &product.name,
                &product.unit,
                quantity,
                product.price_cents,
            ));
        }

        // Stock is validated and decremented inside the repository's
        // atomic unit; the advisory checks above only shape the error.
        let order = self.orders.create(order).await?;
        tracing::info!(order_number = %order.order_number, merchant_id = %order.merchant_id, "order created");

        self.notify(merchant.user_id, NotificationKind::OrderCreated, order.id).await;
        Ok(order)
    }

    pub async fn pay(&self, actor: &Actor, order_id: Uuid) -> Result<Order, CoreError> {
        let order = self.must_get(order_id).await?;
        if order.user_id != actor.user_id {
            return Err(CoreError::Authorization("only the buyer may pay for the order".into()));
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(CoreError::stale("order", "pay", order.status.as_str()));
        }

        let receipt = self.payments.charge(order.id, order.total_cents).await?;
        if receipt.status != PaymentStatus::Succeeded {
            return Err(CoreError::Validation("payment was not accepted".into()));
        }

        let order = self.orders.pay(order_id, &receipt.reference, Utc::now()).await?;
        tracing::info!(order_number = %order.order_number, reference = %receipt.reference, "order paid");

        // Settlement failure is logged and reconciled manually later; the
        // paid transition stays committed.
        if let Err(err) = self
            .ledger
            .settle(
                SplitKind::ProductOrder,
                order.id,
                order.total_cents,
                order.merchant_id,
                None,
            )
            .await
        {
            tracing::error!(order_number = %order.order_number, %err, "order settlement failed");
        }

        self.notify(order.user_id, NotificationKind::OrderPaid, order.id).await;
        if let Some(merchant) = self.accounts.merchant(order.merchant_id).await? {
            self.notify(merchant.user_id, NotificationKind::OrderPaid, order.id).await;
        }
        Ok(order)
    }

    pub async fn ship(
        &self,
        actor: &Actor,
        order_id: Uuid,
        carrier: String,
        tracking_number: Option<String>,
    ) -> Result<Order, CoreError> {
        let order = self.must_get(order_id).await?;
        let merchant = self.accounts.merchant_of_user(actor.user_id).await?;
        if !merchant.map_or(false, |m| m.id == order.merchant_id) {
            return Err(CoreError::Authorization("only the order's merchant may ship".into()));
        }

        let order = self
            .orders
            .ship(order_id, &carrier, tracking_number.as_deref(), Utc::now())
            .await?;
        tracing::info!(order_number = %order.order_number, carrier = %carrier, "order shipped");

        self.notify(order.user_id, NotificationKind::OrderShipped, order.id).await;
        Ok(order)
    }

    pub async fn cancel(&self, actor: &Actor, order_id: Uuid, reason: Option<String>) -> Result<Order, CoreError> {
        let order = self.must_get(order_id).await?;

        let merchant = self.accounts.merchant_of_user(actor.user_id).await?;
        let actor_is_buyer = order.user_id == actor.user_id;
        let actor_is_merchant = merchant.as_ref().map_or(false, |m| m.id == order.merchant_id);
        if !actor_is_buyer && !actor_is_merchant && !actor.is_admin() {
            return Err(CoreError::Authorization(
                "only the buyer or the merchant may cancel the order".into(),
            ));
        }

        // Cancellable only before shipment; the expected pre-state pins
        // the refund decision to the status we actually left.
        let expected = match order.status {
            OrderStatus::PendingPayment => [OrderStatus::PendingPayment],
            OrderStatus::Paid => [OrderStatus::Paid],
            other => return Err(CoreError::stale("order", "cancel", other.as_str())),
        };

        let reason = reason.unwrap_or_else(|| {
            if actor_is_buyer {
                "cancelled by buyer".to_string()
            } else {
                "cancelled by merchant".to_string()
            }
        });
        let (order, previous) = self.orders.cancel(order_id, &expected, &reason, Utc::now()).await?;
        tracing::info!(order_number = %order.order_number, from = previous.as_str(), "order cancelled");

        if previous == OrderStatus::Paid {
            if let Err(err) = self
                .payments
                .refund(order.id, order.total_cents, &order.order_number)
                .await
            {
                tracing::warn!(order_number = %order.order_number, %err, "refund signal failed");
            }
        }

        let counterpart = if actor_is_buyer {
            self.accounts
                .merchant(order.merchant_id)
                .await?
                .map(|m| m.user_id)
                .unwrap_or(order.user_id)
        } else {
            order.user_id
        };
        self.notify(counterpart, NotificationKind::OrderCancelled, order.id).await;
        Ok(order)
    }

    /// Explicit buyer confirmation closes the order.
    pub async fn complete(&self, actor: &Actor, order_id: Uuid) -> Result<Order, CoreError> {
        let order = self.must_get(order_id).await?;
        if order.user_id != actor.user_id {
            return Err(CoreError::Authorization("only the buyer may confirm delivery".into()));
        }

        let order = self.orders.complete(order_id, Utc::now()).await?;
        tracing::info!(order_number = %order.order_number, "order completed");

        if let Some(merchant) = self.accounts.merchant(order.merchant_id).await? {
            self.notify(merchant.user_id, NotificationKind::OrderCompleted, order.id).await;
        }
        Ok(order)
    }

    pub async fn review_product(
        &self,
        actor: &Actor,
        order_id: Uuid,
        product_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<ProductReview, CoreError> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::Validation("rating must be between 1 and 5".into()));
        }
        let order = self.must_get(order_id).await?;
        if order.user_id != actor.user_id {
            return Err(CoreError::Authorization("only the buyer may review the order".into()));
        }
        if order.status != OrderStatus::Completed {
            return Err(CoreError::stale("order", "review", order.status.as_str()));
        }
        if !order.items.iter().any(|i| i.product_id == product_id) {
            return Err(CoreError::Validation("product is not part of this order".into()));
        }

        self.orders
            .insert_review(ProductReview {
                id: Uuid::new_v4(),
                order_id,
                product_id,
                user_id: actor.user_id,
                rating,
                comment,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn get(&self, actor: &Actor, order_id: Uuid) -> Result<Order, CoreError> {
        let order = self.must_get(order_id).await?;
        let merchant = self.accounts.merchant_of_user(actor.user_id).await?;
        let allowed = order.user_id == actor.user_id
            || merchant.map_or(false, |m| m.id == order.merchant_id)
            || actor.is_admin();
        if !allowed {
            return Err(CoreError::Authorization("no access to this order".into()));
        }
        Ok(order)
    }

    pub async fn list_for_user(
        &self,
        actor: &Actor,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError> {
        self.orders.list_for_user(actor.user_id, status, limit, offset).await
    }

    pub async fn list_for_merchant(
        &self,
        actor: &Actor,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, CoreError> {
        let merchant = self
            .accounts
            .merchant_of_user(actor.user_id)
            .await?
            .ok_or_else(|| CoreError::Authorization("actor is not a merchant".into()))?;
        self.orders.list_for_merchant(merchant.id, status, limit, offset).await
    }

    async fn must_get(&self, order_id: Uuid) -> Result<Order, CoreError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("order"))
    }

    async fn notify(&self, user_id: Uuid, kind: NotificationKind, related: Uuid) {
        self.notifier
            .publish(NotificationEvent::templated(
                user_id,
                kind,
                Some(related),
                Utc::now().timestamp(),
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marina_catalog::{InMemoryProductDirectory, Product, ProductStatus};
    use marina_core::identity::InMemoryAccountDirectory;
    use marina_core::notify::RecordingPublisher;
    use marina_core::payment::MockPaymentAdapter;
    use marina_core::{MerchantStatus, Role};
    use marina_ledger::InMemoryLedgerRepository;
    use crate::memory::{InMemoryCartRepository, InMemoryOrderRepository};

    struct Harness {
        engine: OrderEngine,
        products: InMemoryProductDirectory,
        ledger: Arc<SettlementLedger>,
        buyer: Actor,
        merchant_actor: Actor,
        oil_id: Uuid,
        honey_id: Uuid,
    }

    async fn harness() -> Harness {
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let products = InMemoryProductDirectory::new();
        let orders = InMemoryOrderRepository::new(products.clone());
        let cart = InMemoryCartRepository::new();
        let ledger_repo = InMemoryLedgerRepository::with_default_rules().await;
        let ledger = Arc::new(SettlementLedger::new(Arc::new(ledger_repo)));

        let merchant_user = Uuid::new_v4();
        let merchant = accounts.apply_merchant(merchant_user, "Hilltop Farm").await.unwrap();
        accounts
            .set_merchant_status(merchant.id, MerchantStatus::Active)
            .await
            .unwrap();

        let oil = Product::new(merchant.id, "Olive oil", "bottle", 10000, 10);
        let honey = Product::new(merchant.id, "Honey", "jar", 5000, 5);
        let oil_id = oil.id;
        let honey_id = honey.id;
        products.upsert(oil).await.unwrap();
        products.upsert(honey).await.unwrap();

        let engine = OrderEngine::new(
            Arc::new(orders),
            Arc::new(cart),
            Arc::new(products.clone()),
            accounts.clone(),
            ledger.clone(),
            Arc::new(MockPaymentAdapter),
            Arc::new(RecordingPublisher::new()),
            OrderPolicy::default(),
        );

        Harness {
            engine,
            products,
            ledger,
            buyer: Actor::new(Uuid::new_v4(), Role::User),
            merchant_actor: Actor::new(merchant_user, Role::Merchant),
            oil_id,
            honey_id,
        }
    }

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            receiver_name: "Ada".into(),
            receiver_phone: "555-0100".into(),
            receiver_address: "1 Harbor Rd".into(),
            user_notes: None,
        }
    }

    #[tokio::test]
    async fn paid_order_settles_ten_ninety() {
        let h = harness().await;

        h.engine.add_to_cart(&h.buyer, h.oil_id, 1).await.unwrap();
        h.engine.add_to_cart(&h.buyer, h.honey_id, 1).await.unwrap();
        let item_ids: Vec<Uuid> = h
            .engine
            .cart_items(&h.buyer)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();

        let order = h
            .engine
            .create_from_cart(&h.buyer, item_ids, shipping())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.subtotal_cents, 15000);
        // Above the free-shipping threshold.
        assert_eq!(order.shipping_fee_cents, 0);
        assert_eq!(order.total_cents, 15000);
        assert!(h.engine.cart_items(&h.buyer).await.unwrap().is_empty());

        let order = h.engine.pay(&h.buyer, order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.payment_reference.is_some());

        let record = h
            .ledger
            .record_for(SplitKind::ProductOrder, order.id)
            .await
            .unwrap()
            .expect("settlement recorded");
        assert_eq!(record.platform_cents, 1500);
        assert_eq!(record.merchant_cents, 13500);
        assert_eq!(record.crew_cents, 0);
        assert_eq!(
            record.platform_cents + record.merchant_cents + record.crew_cents,
            order.total_cents
        );
    }

    #[tokio::test]
    async fn stock_is_decremented_at_creation_and_guarded() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.honey_id, 3, shipping())
            .await
            .unwrap();
        assert_eq!(h.products.product(h.honey_id).await.unwrap().unwrap().stock, 2);

        let err = h
            .engine
            .create_direct(&h.buyer, h.honey_id, 3, shipping())
            .await
            .unwrap_err();
        match err {
            CoreError::InsufficientStock {
                requested, available, ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Failed creation leaves stock unchanged.
        assert_eq!(h.products.product(h.honey_id).await.unwrap().unwrap().stock, 2);

        h.engine.cancel(&h.buyer, order.id, None).await.unwrap();
        assert_eq!(h.products.product(h.honey_id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn sold_out_flips_and_relists_on_cancel() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.honey_id, 5, shipping())
            .await
            .unwrap();
        let product = h.products.product(h.honey_id).await.unwrap().unwrap();
        assert_eq!(product.stock, 0);
        assert_eq!(product.status, ProductStatus::SoldOut);

        h.engine.cancel(&h.buyer, order.id, None).await.unwrap();
        let product = h.products.product(h.honey_id).await.unwrap().unwrap();
        assert_eq!(product.stock, 5);
        assert_eq!(product.status, ProductStatus::Available);
    }

    #[tokio::test]
    async fn line_items_snapshot_prices() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.oil_id, 1, shipping())
            .await
            .unwrap();

        // Catalog price doubles after the order is placed.
        let mut product = h.products.product(h.oil_id).await.unwrap().unwrap();
        product.price_cents = 20000;
        h.products.upsert(product).await.unwrap();

        let order = h.engine.pay(&h.buyer, order.id).await.unwrap();
        assert_eq!(order.items[0].unit_price_cents, 10000);
        assert_eq!(order.total_cents, 10000);
    }

    #[tokio::test]
    async fn full_fulfilment_path() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.oil_id, 1, shipping())
            .await
            .unwrap();
        let order = h.engine.pay(&h.buyer, order.id).await.unwrap();

        let err = h
            .engine
            .ship(&h.buyer, order.id, "Coastal Express".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Authorization(_)));

        let order = h
            .engine
            .ship(&h.merchant_actor, order.id, "Coastal Express".into(), Some("CE-1042".into()))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.carrier.as_deref(), Some("Coastal Express"));

        // No cancellation once shipped.
        let err = h.engine.cancel(&h.buyer, order.id, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

        let order = h.engine.complete(&h.buyer, order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        let review = h
            .engine
            .review_product(&h.buyer, order.id, h.oil_id, 5, Some("excellent".into()))
            .await
            .unwrap();
        assert_eq!(review.rating, 5);

        let err = h
            .engine
            .review_product(&h.buyer, order.id, h.oil_id, 4, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn terminal_order_rejects_transitions() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.oil_id, 1, shipping())
            .await
            .unwrap();
        h.engine.cancel(&h.buyer, order.id, None).await.unwrap();

        let err = h.engine.pay(&h.buyer, order.id).await.unwrap_err();
        match err {
            CoreError::InvalidStateTransition { actual, .. } => assert_eq!(actual, "cancelled"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn paid_cancel_restores_stock() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.honey_id, 2, shipping())
            .await
            .unwrap();
        let order = h.engine.pay(&h.buyer, order.id).await.unwrap();
        assert_eq!(h.products.product(h.honey_id).await.unwrap().unwrap().stock, 3);

        h.engine.cancel(&h.merchant_actor, order.id, Some("out of season".into())).await.unwrap();
        assert_eq!(h.products.product(h.honey_id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn cart_merges_repeated_adds() {
        let h = harness().await;

        h.engine.add_to_cart(&h.buyer, h.honey_id, 1).await.unwrap();
        h.engine.add_to_cart(&h.buyer, h.honey_id, 2).await.unwrap();
        let items = h.engine.cart_items(&h.buyer).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[tokio::test]
    async fn mixed_merchant_cart_is_rejected() {
        let h = harness().await;

        let other_merchant = Uuid::new_v4();
        let cheese = Product::new(other_merchant, "Cheese", "wheel", 4000, 4);
        let cheese_id = cheese.id;
        h.products.upsert(cheese).await.unwrap();

        h.engine.add_to_cart(&h.buyer, h.oil_id, 1).await.unwrap();
        h.engine.add_to_cart(&h.buyer, cheese_id, 1).await.unwrap();
        let item_ids: Vec<Uuid> = h
            .engine
            .cart_items(&h.buyer)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();

        let err = h
            .engine
            .create_from_cart(&h.buyer, item_ids, shipping())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn small_orders_pay_the_shipping_fee() {
        let h = harness().await;

        let order = h
            .engine
            .create_direct(&h.buyer, h.honey_id, 1, shipping())
            .await
            .unwrap();
        assert_eq!(order.subtotal_cents, 5000);
        assert_eq!(order.shipping_fee_cents, 1000);
        assert_eq!(order.total_cents, 6000);
    }
}
