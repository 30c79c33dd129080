//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use queueinator_core::application::TransferOutcome;
use queueinator_core::domain::DomainError;
use queueinator_core::error::{AppError, TransferError};
use queueinator_core::port::CatalogError;
use serde_json::json;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const PARTIAL_MOVE: i32 = 4090;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const BACKEND_ERROR: i32 = 5001;
}

pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Domain(e) => {
            let code = match e {
                DomainError::NodeNotFound(_) => code::NOT_FOUND,
                DomainError::Internal(_) => code::INTERNAL_ERROR,
                _ => code::VALIDATION_ERROR,
            };
            ErrorObjectOwned::owned(code, e.to_string(), None::<()>)
        }
        AppError::Catalog(e) => catalog_error(e),
        AppError::Transfer(e) => transfer_error(e, &[], 0),
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
        AppError::Io(e) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, e.to_string(), None::<()>)
        }
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Config(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}

fn catalog_error(err: CatalogError) -> ErrorObjectOwned {
    let code = match &err {
        CatalogError::AlreadyExists(_) => code::CONFLICT,
        CatalogError::NotFound(_) => code::NOT_FOUND,
        CatalogError::AccessDenied(_)
        | CatalogError::Unsupported(_)
        | CatalogError::InvalidName(_) => code::VALIDATION_ERROR,
        CatalogError::Enumeration(_)
        | CatalogError::Write { .. }
        | CatalogError::Delete { .. }
        | CatalogError::Backend(_) => code::BACKEND_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

/// Convert a transfer failure; `data` carries the transfers that completed
/// before it and, for a partial move, where the duplicate was written
pub fn transfer_error(
    err: TransferError,
    completed: &[TransferOutcome],
    skipped: usize,
) -> ErrorObjectOwned {
    let completed_ids: Vec<&str> = completed.iter().map(|o| o.original_id.as_str()).collect();

    match &err {
        TransferError::SameQueue { .. } => ErrorObjectOwned::owned(
            code::VALIDATION_ERROR,
            err.to_string(),
            Some(json!({ "completed": completed_ids, "skipped": skipped })),
        ),
        TransferError::Write { target, .. } => ErrorObjectOwned::owned(
            code::BACKEND_ERROR,
            err.to_string(),
            Some(json!({
                "completed": completed_ids,
                "skipped": skipped,
                "target": target.to_string(),
            })),
        ),
        TransferError::PartialMove {
            source_queue,
            target,
            message_id,
            written,
            ..
        } => ErrorObjectOwned::owned(
            code::PARTIAL_MOVE,
            err.to_string(),
            Some(json!({
                "completed": completed_ids,
                "skipped": skipped,
                "source": source_queue.to_string(),
                "target": target.to_string(),
                "message_id": message_id,
                "written_id": written.id,
            })),
        ),
    }
}
