//! Storage adapters implementing `DataModelProvider`.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryProvider;
pub use postgres::{ensure_database_exists, PgProvider};
