pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{Fault, MemoryStorage};
pub use postgres::PgStorage;
pub use store::{Storage, StorageTx};
