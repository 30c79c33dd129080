//! JSON-RPC Server
//!
//! Serves the browser session over JSON-RPC 2.0 on a localhost TCP port.

use crate::handler::RpcHandler;
use crate::rate_limiter::{RateLimiter, DEFAULT_BURST, DEFAULT_RATE};
use crate::types::{CreateQueueRequest, InsertRequest, InspectRequest, NodeRequest, TransferRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use queueinator_core::application::BrowserSession;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

// jsonrpsee has no Unix socket transport; bind to loopback only
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9531;

#[derive(Error, Debug)]
pub enum RpcServerError {
    #[error("Failed to bind JSON-RPC server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register method {method}: {reason}")]
    Register { method: &'static str, reason: String },
}

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
    /// Burst size of the mutating-method rate limiter
    pub rate_limit_burst: u32,
    /// Sustained mutating requests per second
    pub rate_limit_rate: u32,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            rate_limit_burst: DEFAULT_BURST,
            rate_limit_rate: DEFAULT_RATE,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

macro_rules! register {
    ($module:expr, $handler:expr, $method:literal, |$h:ident| $call:expr) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($method, move |_params, _, _| {
                let $h = handler.clone();
                async move { $call.await }
            })
            .map_err(|e| RpcServerError::Register {
                method: $method,
                reason: e.to_string(),
            })?;
    }};
    ($module:expr, $handler:expr, $method:literal, $req:ty, |$h:ident, $p:ident| $call:expr) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($method, move |params, _, _| {
                let $h = handler.clone();
                async move {
                    let $p: $req = params.parse()?;
                    $call.await
                }
            })
            .map_err(|e| RpcServerError::Register {
                method: $method,
                reason: e.to_string(),
            })?;
    }};
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, session: Arc<BrowserSession>) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_burst, config.rate_limit_rate);
        Self {
            handler: Arc::new(RpcHandler::new(session, limiter)),
            config,
        }
    }

    /// Build the method table
    pub fn module(&self) -> Result<RpcModule<()>, RpcServerError> {
        let mut module = RpcModule::new(());
        let handler = &self.handler;

        register!(module, handler, "tree.build.v1", |h| h.build_tree());
        register!(module, handler, "tree.get.v1", |h| h.get_tree());
        register!(module, handler, "tree.refresh_node.v1", NodeRequest, |h, req| h
            .refresh_node(req));
        register!(module, handler, "queue.messages.v1", NodeRequest, |h, req| h
            .messages(req));
        register!(module, handler, "message.inspect.v1", InspectRequest, |h, req| h
            .inspect(req));
        register!(module, handler, "message.transfer.v1", TransferRequest, |h, req| h
            .transfer(req));
        register!(module, handler, "message.insert.v1", InsertRequest, |h, req| h
            .insert(req));
        register!(module, handler, "queue.create.v1", CreateQueueRequest, |h, req| h
            .create_queue(req));
        register!(module, handler, "queue.delete.v1", NodeRequest, |h, req| h
            .delete_queue(req));
        register!(module, handler, "queue.purge.v1", NodeRequest, |h, req| h
            .purge_queue(req));

        Ok(module)
    }

    /// Start the JSON-RPC server; returns the bound address and a stop handle
    ///
    /// Security: binds to the configured host, 127.0.0.1 by default
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), RpcServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| RpcServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server.local_addr().map_err(|source| RpcServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let module = self.module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started successfully");
        Ok((local_addr, handle))
    }
}
