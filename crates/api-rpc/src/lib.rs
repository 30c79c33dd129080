//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the Queueinator browser session.
//! Method names are versioned (`tree.get.v1`) so clients can pin a contract.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig, RpcServerError};
