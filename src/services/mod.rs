pub mod orders;

pub use orders::{OrderError, OrderService, PlacedOrder};
