//! Helpers for translating internal errors into protocol-specific payloads.

use crate::errors::AgentError;
use a2a_types::{error_codes, JSONRPCError};
use serde_json::json;

/// Map an [`AgentError`] into an A2A-compliant [`JSONRPCError`].
///
/// Client mistakes keep their message; everything else is reported as an
/// internal error with the details attached as data.
#[must_use]
pub fn to_jsonrpc_error(error: AgentError) -> JSONRPCError {
    use AgentError::{
        InvalidInput, MissingInput, Serialization, TaskNotCancelable, TaskNotFound,
        UnsupportedOperation,
    };

    match error {
        InvalidInput(message) | MissingInput(message) => {
            JSONRPCError::new(error_codes::INVALID_PARAMS, message)
        }
        Serialization { format, reason } => {
            JSONRPCError::new(error_codes::INVALID_PARAMS, format!("Invalid {format}: {reason}"))
        }
        TaskNotFound { task_id } => {
            JSONRPCError::new(error_codes::TASK_NOT_FOUND, format!("Task not found: {task_id}"))
                .with_data(json!({ "taskId": task_id }))
        }
        TaskNotCancelable { task_id, reason } => {
            JSONRPCError::new(error_codes::TASK_NOT_CANCELABLE, reason)
                .with_data(json!({ "taskId": task_id }))
        }
        UnsupportedOperation { operation } => JSONRPCError::new(
            error_codes::UNSUPPORTED_OPERATION,
            format!("Unsupported operation: {operation}"),
        ),
        other => JSONRPCError::internal_error().with_data(json!({
            "details": other.to_string(),
        })),
    }
}
