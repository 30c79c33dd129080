//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params to `BrowserSession` use cases.

use crate::error::{throttled, to_rpc_error, transfer_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CreateQueueRequest, DeleteQueueResponse, InsertRequest, InsertResponse, InspectRequest,
    InspectResponse, MessagesResponse, NodeRequest, PurgeResponse, QueueResponse,
    RefreshResponse, TransferRequest, TransferResponse, TreeResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use queueinator_core::application::BrowserSession;
use queueinator_core::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    session: Arc<BrowserSession>,
    rate_limiter: RateLimiter,
}

impl RpcHandler {
    pub fn new(session: Arc<BrowserSession>, rate_limiter: RateLimiter) -> Self {
        Self {
            session,
            rate_limiter,
        }
    }

    fn check_rate(&self) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.try_acquire() {
            Ok(())
        } else {
            warn!("Rate limit exceeded");
            Err(throttled())
        }
    }

    /// tree.build.v1
    pub async fn build_tree(&self) -> Result<TreeResponse, ErrorObjectOwned> {
        Ok(TreeResponse {
            tree: self.session.build_hierarchy().await,
        })
    }

    /// tree.get.v1
    pub async fn get_tree(&self) -> Result<TreeResponse, ErrorObjectOwned> {
        Ok(TreeResponse {
            tree: self.session.tree().await,
        })
    }

    /// tree.refresh_node.v1
    pub async fn refresh_node(
        &self,
        params: NodeRequest,
    ) -> Result<RefreshResponse, ErrorObjectOwned> {
        self.session
            .refresh_node(&params.node)
            .await
            .map_err(to_rpc_error)
    }

    /// queue.messages.v1
    pub async fn messages(&self, params: NodeRequest) -> Result<MessagesResponse, ErrorObjectOwned> {
        let queue = self.session.select(&params.node).await.map_err(to_rpc_error)?;
        let messages = self
            .session
            .list_messages(&params.node)
            .await
            .map_err(to_rpc_error)?;
        Ok(MessagesResponse { queue, messages })
    }

    /// message.inspect.v1
    pub async fn inspect(&self, params: InspectRequest) -> Result<InspectResponse, ErrorObjectOwned> {
        self.session
            .message_details(&params.node, &params.message_id)
            .await
            .map_err(to_rpc_error)
    }

    /// message.transfer.v1
    ///
    /// Every requested message is looked up before anything is written, so
    /// an unknown id fails the call with nothing transferred.
    pub async fn transfer(
        &self,
        params: TransferRequest,
    ) -> Result<TransferResponse, ErrorObjectOwned> {
        self.check_rate()?;

        if params.message_ids.is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "message_ids must not be empty".to_string(),
            )));
        }

        let source = self.session.select(&params.source).await.map_err(to_rpc_error)?;
        let target = self.session.select(&params.target).await.map_err(to_rpc_error)?;

        let mut messages = Vec::with_capacity(params.message_ids.len());
        for id in &params.message_ids {
            messages.push(
                self.session
                    .message(&params.source, id)
                    .await
                    .map_err(to_rpc_error)?,
            );
        }

        let report = self
            .session
            .transfer_batch(&messages, &source, &target, params.mode)
            .await;

        info!(
            mode = %params.mode,
            source = %source,
            target = %target,
            requested = params.message_ids.len(),
            completed = report.completed.len(),
            "Transfer request handled"
        );

        match report.failure {
            Some(err) => Err(transfer_error(err, &report.completed, report.skipped)),
            None => Ok(TransferResponse {
                completed: report.completed,
                refreshed: report.refreshed,
            }),
        }
    }

    /// message.insert.v1
    pub async fn insert(&self, params: InsertRequest) -> Result<InsertResponse, ErrorObjectOwned> {
        self.check_rate()?;

        let written = self
            .session
            .insert_message(&params.node, &params.content)
            .await
            .map_err(to_rpc_error)?;
        Ok(InsertResponse {
            queue: written.queue,
            message_id: written.id,
        })
    }

    /// queue.create.v1
    pub async fn create_queue(
        &self,
        params: CreateQueueRequest,
    ) -> Result<QueueResponse, ErrorObjectOwned> {
        self.check_rate()?;

        let queue = self
            .session
            .create_queue(&params.parent, &params.name)
            .await
            .map_err(to_rpc_error)?;
        Ok(QueueResponse { queue })
    }

    /// queue.delete.v1
    pub async fn delete_queue(
        &self,
        params: NodeRequest,
    ) -> Result<DeleteQueueResponse, ErrorObjectOwned> {
        self.check_rate()?;

        self.session
            .delete_queue(&params.node)
            .await
            .map_err(to_rpc_error)?;
        Ok(DeleteQueueResponse { deleted: true })
    }

    /// queue.purge.v1
    pub async fn purge_queue(&self, params: NodeRequest) -> Result<PurgeResponse, ErrorObjectOwned> {
        self.check_rate()?;

        let removed = self
            .session
            .purge_queue(&params.node)
            .await
            .map_err(to_rpc_error)?;
        Ok(PurgeResponse { removed })
    }
}
