// Queueinator Infrastructure - SQLite Adapter
// Implements: CatalogSource over a local queue store

mod catalog;
mod connection;
mod migration;

pub use catalog::SqliteCatalog;
pub use connection::{create_pool, PoolError};
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for CatalogError here)
