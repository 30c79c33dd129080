// Port Layer - Interfaces for external dependencies

pub mod catalog_source;
pub mod id_provider; // For deterministic testing
pub mod time_provider;

// Re-exports
pub use catalog_source::{CatalogError, CatalogSource};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
