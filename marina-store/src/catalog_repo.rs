use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_catalog::{Boat, BoatDirectory, BoatStatus, Product, ProductDirectory};
use marina_core::CoreError;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

pub struct PgBoatDirectory {
    pool: PgPool,
}

impl PgBoatDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOAT_COLUMNS: &str =
    "id, merchant_id, name, capacity, hourly_rate_cents, status, description, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BoatRow {
    id: Uuid,
    merchant_id: Uuid,
    name: String,
    capacity: i32,
    hourly_rate_cents: i64,
    status: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BoatRow {
    fn into_boat(self) -> Result<Boat, CoreError> {
        Ok(Boat {
            id: self.id,
            merchant_id: self.merchant_id,
            name: self.name,
            capacity: self.capacity,
            hourly_rate_cents: self.hourly_rate_cents,
            status: BoatStatus::from_str(&self.status)?,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl BoatDirectory for PgBoatDirectory {
    async fn boat(&self, id: Uuid) -> Result<Option<Boat>, CoreError> {
        let row: Option<BoatRow> = sqlx::query_as(&format!("SELECT {BOAT_COLUMNS} FROM boats WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(BoatRow::into_boat).transpose()
    }

    async fn upsert(&self, boat: Boat) -> Result<Boat, CoreError> {
        sqlx::query(
            "INSERT INTO boats (id, merchant_id, name, capacity, hourly_rate_cents, status, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, capacity = EXCLUDED.capacity, \
                 hourly_rate_cents = EXCLUDED.hourly_rate_cents, status = EXCLUDED.status, \
                 description = EXCLUDED.description, updated_at = EXCLUDED.updated_at",
        )
        .bind(boat.id)
        .bind(boat.merchant_id)
        .bind(&boat.name)
        .bind(boat.capacity)
        .bind(boat.hourly_rate_cents)
        .bind(boat.status.as_str())
        .bind(&boat.description)
        .bind(boat.created_at)
        .bind(boat.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(boat)
    }

    async fn list_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Boat>, CoreError> {
        let rows: Vec<BoatRow> = sqlx::query_as(&format!(
            "SELECT {BOAT_COLUMNS} FROM boats WHERE merchant_id = $1 ORDER BY created_at"
        ))
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(BoatRow::into_boat).collect()
    }

    async fn set_status(&self, id: Uuid, status: BoatStatus) -> Result<Boat, CoreError> {
        let row: Option<BoatRow> = sqlx::query_as(&format!(
            "UPDATE boats SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {BOAT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.ok_or_else(|| CoreError::not_found("boat"))?.into_boat()
    }
}

pub struct PgProductDirectory {
    pool: PgPool,
}

impl PgProductDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, merchant_id, name, unit, price_cents, stock, sales_count, status, description, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    merchant_id: Uuid,
    name: String,
    unit: String,
    price_cents: i64,
    stock: i32,
    sales_count: i32,
    status: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product, CoreError> {
        Ok(Product {
            id: self.id,
            merchant_id: self.merchant_id,
            name: self.name,
            unit: self.unit,
            price_cents: self.price_cents,
            stock: self.stock,
            sales_count: self.sales_count,
            status: marina_catalog::ProductStatus::from_str(&self.status)?,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl ProductDirectory for PgProductDirectory {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, CoreError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(ProductRow::into_product).transpose()
    }

    async fn upsert(&self, product: Product) -> Result<Product, CoreError> {
        sqlx::query(
            "INSERT INTO products (id, merchant_id, name, unit, price_cents, stock, sales_count, status, description, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, unit = EXCLUDED.unit, price_cents = EXCLUDED.price_cents, \
                 stock = EXCLUDED.stock, sales_count = EXCLUDED.sales_count, status = EXCLUDED.status, \
                 description = EXCLUDED.description, updated_at = EXCLUDED.updated_at",
        )
        .bind(product.id)
        .bind(product.merchant_id)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.sales_count)
        .bind(product.status.as_str())
        .bind(&product.description)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(product)
    }

    async fn list_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Product>, CoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE merchant_id = $1 ORDER BY created_at"
        ))
        .bind(merchant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }
}
