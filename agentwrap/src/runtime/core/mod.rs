//! Core task lifecycle machinery.
//!
//! # Modules
//!
//! - [`dispatcher`] - Uniform events to protocol events, finality decisions
//! - [`executor`] - The control loop driving an adapter per request
//! - [`cancellation`] - Cooperative cancellation of event streams
//! - [`status_mapper`] - A2A protocol status conversion utilities
//! - [`error_mapper`] - `AgentError` to JSON-RPC errors

pub mod cancellation;
pub mod dispatcher;
pub mod error_mapper;
pub mod executor;
pub mod status_mapper;

pub use cancellation::cancellable;
pub use dispatcher::TaskEventDispatcher;
pub use error_mapper::to_jsonrpc_error;
pub use executor::AgentExecutor;
