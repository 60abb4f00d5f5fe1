use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marina_core::CoreError;
use marina_shared::Cents;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Available,
    SoldOut,
    Delisted,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "available",
            ProductStatus::SoldOut => "sold_out",
            ProductStatus::Delisted => "delisted",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ProductStatus::Available),
            "sold_out" => Ok(ProductStatus::SoldOut),
            "delisted" => Ok(ProductStatus::Delisted),
            other => Err(CoreError::Validation(format!("unknown product status: {other}"))),
        }
    }
}

/// A storefront product (farm produce, provisions) owned by a merchant.
/// `stock` is the single source of truth for sellable quantity; order
/// creation decrements it and cancellation restores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub unit: String,
    pub price_cents: Cents,
    pub stock: i32,
    pub sales_count: i32,
    pub status: ProductStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(merchant_id: Uuid, name: &str, unit: &str, price_cents: Cents, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            name: name.to_string(),
            unit: unit.to_string(),
            price_cents,
            stock,
            sales_count: 0,
            status: ProductStatus::Available,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_sellable(&self) -> bool {
        self.status == ProductStatus::Available
    }

    /// Deduct sold quantity; flips to SoldOut when stock hits zero.
    pub fn deduct_stock(&mut self, quantity: i32) -> Result<(), CoreError> {
        if !self.is_sellable() {
            return Err(CoreError::Validation(format!("product {} is not available", self.name)));
        }
        if self.stock < quantity {
            return Err(CoreError::InsufficientStock {
                product_id: self.id,
                requested: quantity,
                available: self.stock,
            });
        }
        self.stock -= quantity;
        self.sales_count += quantity;
        if self.stock == 0 {
            self.status = ProductStatus::SoldOut;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Restore stock released by a cancelled order; relists a sold-out
    /// product once quantity is back.
    pub fn restore_stock(&mut self, quantity: i32) {
        self.stock += quantity;
        self.sales_count -= quantity;
        if self.status == ProductStatus::SoldOut && self.stock > 0 {
            self.status = ProductStatus::Available;
        }
        self.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait ProductDirectory: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<Product>, CoreError>;
    async fn upsert(&self, product: Product) -> Result<Product, CoreError>;
    async fn list_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Product>, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduct_flips_sold_out_at_zero() {
        let mut product = Product::new(Uuid::new_v4(), "Olive oil", "bottle", 1500, 3);
        product.deduct_stock(3).unwrap();
        assert_eq!(product.stock, 0);
        assert_eq!(product.sales_count, 3);
        assert_eq!(product.status, ProductStatus::SoldOut);
    }

    #[test]
    fn deduct_beyond_stock_fails_and_leaves_stock_unchanged() {
        let mut product = Product::new(Uuid::new_v4(), "Honey", "jar", 800, 2);
        let err = product.deduct_stock(5).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                requested, available, ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(product.stock, 2);
        assert_eq!(product.status, ProductStatus::Available);
    }

    #[test]
    fn restore_relists_sold_out_product() {
        let mut product = Product::new(Uuid::new_v4(), "Cider", "crate", 2400, 1);
        product.deduct_stock(1).unwrap();
        assert_eq!(product.status, ProductStatus::SoldOut);
        product.restore_stock(1);
        assert_eq!(product.stock, 1);
        assert_eq!(product.sales_count, 0);
        assert_eq!(product.status, ProductStatus::Available);
    }
}
