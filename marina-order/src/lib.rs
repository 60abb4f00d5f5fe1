pub mod engine;
pub mod memory;
pub mod models;
pub mod repository;

pub use engine::OrderEngine;
pub use memory::{InMemoryCartRepository, InMemoryOrderRepository};
pub use models::{CartItem, Order, OrderItem, OrderPolicy, OrderStatus, ProductReview, ShippingDetails};
pub use repository::{CartRepository, OrderRepository};
