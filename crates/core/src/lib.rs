// Queueinator Core - Domain Logic & Ports
// NO infrastructure dependencies (hexagonal: adapters live in sibling crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result, TransferError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
