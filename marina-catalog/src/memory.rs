use async_trait::async_trait;
use chrono::Utc;
use marina_core::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::boat::{Boat, BoatDirectory, BoatStatus};
use crate::product::{Product, ProductDirectory};

/// In-memory directories for tests and local development. The product map
/// is Arc-shared so the in-memory order repository can mutate stock under
/// the same lock it validates against.
#[derive(Default, Clone)]
pub struct InMemoryBoatDirectory {
    boats: Arc<RwLock<HashMap<Uuid, Boat>>>,
}

impl InMemoryBoatDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BoatDirectory for InMemoryBoatDirectory {
    async fn boat(&self, id: Uuid) -> Result<Option<Boat>, CoreError> {
        Ok(self.boats.read().await.get(&id).cloned())
    }

    async fn upsert(&self, boat: Boat) -> Result<Boat, CoreError> {
        self.boats.write().await.insert(boat.id, boat.clone());
        Ok(boat)
    }

    async fn list_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Boat>, CoreError> {
        Ok(self
            .boats
            .read()
            .await
            .values()
            .filter(|b| b.merchant_id == merchant_id)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: BoatStatus) -> Result<Boat, CoreError> {
        let mut boats = self.boats.write().await;
        let boat = boats.get_mut(&id).ok_or_else(|| CoreError::not_found("boat"))?;
        boat.status = status;
        boat.updated_at = Utc::now();
        Ok(boat.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryProductDirectory {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
}

impl InMemoryProductDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduct stock for one line; all-or-nothing within the write lock.
    pub async fn deduct(&self, product_id: Uuid, quantity: i32) -> Result<(), CoreError> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| CoreError::not_found("product"))?;
        product.deduct_stock(quantity)
    }

    pub async fn restore(&self, product_id: Uuid, quantity: i32) -> Result<(), CoreError> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| CoreError::not_found("product"))?;
        product.restore_stock(quantity);
        Ok(())
    }
}

#[async_trait]
impl ProductDirectory for InMemoryProductDirectory {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, CoreError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn upsert(&self, product: Product) -> Result<Product, CoreError> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(product)
    }

    async fn list_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Product>, CoreError> {
        Ok(self
            .products
            .read()
            .await
            .values()
            .filter(|p| p.merchant_id == merchant_id)
            .cloned()
            .collect())
    }
}
