pub mod boat;
pub mod memory;
pub mod pricing;
pub mod product;

pub use boat::{Boat, BoatDirectory, BoatStatus};
pub use memory::{InMemoryBoatDirectory, InMemoryProductDirectory};
pub use product::{Product, ProductDirectory, ProductStatus};
