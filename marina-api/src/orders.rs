use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use marina_core::Actor;
use marina_order::{CartItem, Order, OrderStatus, ProductReview, ShippingDetails};
use marina_shared::Masked;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct AddCartItemRequest {
    product_id: Uuid,
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct ShippingFields {
    receiver_name: String,
    receiver_phone: Masked<String>,
    receiver_address: String,
    user_notes: Option<String>,
}

impl ShippingFields {
    fn into_details(self) -> ShippingDetails {
        ShippingDetails {
            receiver_name: self.receiver_name,
            receiver_phone: self.receiver_phone.into_inner(),
            receiver_address: self.receiver_address,
            user_notes: self.user_notes,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    cart_item_ids: Vec<Uuid>,
    #[serde(flatten)]
    shipping: ShippingFields,
}

#[derive(Debug, Deserialize)]
struct DirectOrderRequest {
    product_id: Uuid,
    quantity: i32,
    #[serde(flatten)]
    shipping: ShippingFields,
}

#[derive(Debug, Deserialize)]
struct ShipRequest {
    carrier: String,
    tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelRequest {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    product_id: Uuid,
    rating: i32,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<OrderStatus>,
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl ListQuery {
    fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.page_size
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/cart", get(list_cart))
        .route("/v1/cart/items", post(add_cart_item))
        .route("/v1/cart/items/{id}", delete(remove_cart_item))
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/direct", post(create_direct_order))
        .route("/v1/merchant/orders", get(list_merchant_orders))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/pay", post(pay_order))
        .route("/v1/orders/{id}/ship", post(ship_order))
        .route("/v1/orders/{id}/cancel", post(cancel_order))
        .route("/v1/orders/{id}/complete", post(complete_order))
        .route("/v1/orders/{id}/reviews", post(review_order))
}

async fn add_cart_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<AddCartItemRequest>,
) -> Result<Json<CartItem>, AppError> {
    Ok(Json(state.orders.add_to_cart(&actor, req.product_id, req.quantity).await?))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.orders.remove_from_cart(&actor, id).await?;
    Ok(Json(serde_json::json!({"removed": true})))
}

async fn list_cart(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<CartItem>>, AppError> {
    Ok(Json(state.orders.cart_items(&actor).await?))
}

async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .create_from_cart(&actor, req.cart_item_ids, req.shipping.into_details())
        .await?;
    Ok(Json(order))
}

async fn create_direct_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<DirectOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .create_direct(&actor, req.product_id, req.quantity, req.shipping.into_details())
        .await?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.get(&actor, id).await?))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .orders
        .list_for_user(&actor, query.status, query.page_size, query.offset())
        .await?;
    Ok(Json(orders))
}

async fn list_merchant_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .orders
        .list_for_merchant(&actor, query.status, query.page_size, query.offset())
        .await?;
    Ok(Json(orders))
}

async fn pay_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.pay(&actor, id).await?))
}

async fn ship_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ShipRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.ship(&actor, id, req.carrier, req.tracking_number).await?))
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.cancel(&actor, id, req.reason).await?))
}

async fn complete_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.complete(&actor, id).await?))
}

async fn review_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ProductReview>, AppError> {
    let review = state
        .orders
        .review_product(&actor, id, req.product_id, req.rating, req.comment)
        .await?;
    Ok(Json(review))
}
