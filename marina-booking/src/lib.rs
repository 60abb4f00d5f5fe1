pub mod access;
pub mod engine;
pub mod memory;
pub mod models;
pub mod repository;
pub mod sweep;

pub use engine::{BookingEngine, CreateBooking};
pub use memory::InMemoryBookingRepository;
pub use models::{Booking, BookingPolicy, BookingStatus, CrewRating, TimeWindow};
pub use repository::BookingRepository;
pub use sweep::SweepOutcome;
