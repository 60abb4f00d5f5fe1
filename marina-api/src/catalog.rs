use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use marina_catalog::{Boat, BoatStatus, Product};
use marina_core::{Actor, CoreError};
use marina_shared::Cents;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct UpsertBoatRequest {
    id: Option<Uuid>,
    name: String,
    capacity: i32,
    hourly_rate_cents: Cents,
    status: Option<BoatStatus>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpsertProductRequest {
    id: Option<Uuid>,
    name: String,
    unit: String,
    price_cents: Cents,
    stock: i32,
    description: Option<String>,
}

/// Read-only storefront endpoints, no token required.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/boats/{id}", get(get_boat))
        .route("/v1/products/{id}", get(get_product))
        .route("/v1/merchants/{id}/boats", get(list_merchant_boats))
        .route("/v1/merchants/{id}/products", get(list_merchant_products))
}

/// Merchant-side catalog management.
pub fn merchant_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/merchant/boats", post(upsert_boat).get(my_boats))
        .route("/v1/merchant/products", post(upsert_product).get(my_products))
}

async fn get_boat(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Boat>, AppError> {
    let boat = state.boats.boat(id).await?.ok_or_else(|| CoreError::not_found("boat"))?;
    Ok(Json(boat))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>, AppError> {
    let product = state
        .products
        .product(id)
        .await?
        .ok_or_else(|| CoreError::not_found("product"))?;
    Ok(Json(product))
}

async fn list_merchant_boats(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Boat>>, AppError> {
    Ok(Json(state.boats.list_for_merchant(id).await?))
}

async fn list_merchant_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.products.list_for_merchant(id).await?))
}

async fn require_merchant(state: &AppState, actor: &Actor) -> Result<marina_core::MerchantProfile, AppError> {
    let merchant = state
        .accounts
        .merchant_of_user(actor.user_id)
        .await?
        .ok_or_else(|| CoreError::Authorization("actor is not a merchant".into()))?;
    if !merchant.is_active() {
        return Err(CoreError::Authorization("merchant has not been approved".into()).into());
    }
    Ok(merchant)
}

async fn upsert_boat(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpsertBoatRequest>,
) -> Result<Json<Boat>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;

    let mut boat = match req.id {
        Some(id) => {
            let existing = state.boats.boat(id).await?.ok_or_else(|| CoreError::not_found("boat"))?;
            if existing.merchant_id != merchant.id {
                return Err(CoreError::Authorization("boat belongs to another merchant".into()).into());
            }
            existing
        }
        None => Boat::new(merchant.id, &req.name, req.capacity, req.hourly_rate_cents),
    };
    boat.name = req.name;
    boat.capacity = req.capacity;
    boat.hourly_rate_cents = req.hourly_rate_cents;
    boat.description = req.description;
    if let Some(status) = req.status {
        boat.status = status;
    }
    boat.updated_at = Utc::now();

    Ok(Json(state.boats.upsert(boat).await?))
}

async fn my_boats(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Boat>>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;
    Ok(Json(state.boats.list_for_merchant(merchant.id).await?))
}

async fn upsert_product(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpsertProductRequest>,
) -> Result<Json<Product>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;

    let mut product = match req.id {
        Some(id) => {
            let existing = state
                .products
                .product(id)
                .await?
                .ok_or_else(|| CoreError::not_found("product"))?;
            if existing.merchant_id != merchant.id {
                return Err(CoreError::Authorization("product belongs to another merchant".into()).into());
            }
            existing
        }
        None => Product::new(merchant.id, &req.name, &req.unit, req.price_cents, req.stock),
    };
    product.name = req.name;
    product.unit = req.unit;
    product.price_cents = req.price_cents;
    product.stock = req.stock;
    product.description = req.description;
    product.updated_at = Utc::now();

    Ok(Json(state.products.upsert(product).await?))
}

async fn my_products(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Product>>, AppError> {
    let merchant = require_merchant(&state, &actor).await?;
    Ok(Json(state.products.list_for_merchant(merchant.id).await?))
}
