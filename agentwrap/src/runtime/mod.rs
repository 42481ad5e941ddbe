//! Task lifecycle runtime.
//!
//! The runtime sits between a transport (see `agentwrap-axum`) and an
//! [`AgentAdapter`](crate::adapter::AgentAdapter):
//!
//! 1. The transport builds a [`RequestContext`] through
//!    [`AgentExecutor::prepare`], which resolves the task being continued.
//! 2. [`AgentExecutor::execute`] selects the delivery mode, runs the adapter
//!    and feeds each [`UniformEvent`](crate::adapter::UniformEvent) to the
//!    [`TaskEventDispatcher`].
//! 3. The dispatcher appends protocol events to the request's [`EventQueue`],
//!    which the transport drains.

pub mod context;
pub mod core;
pub mod event_queue;
pub mod task_store;

pub use self::context::{
    select_delivery, DeliveryMode, QueryContext, RequestContext, TransportHints,
};
pub use self::core::{AgentExecutor, TaskEventDispatcher};
pub use event_queue::{EventQueue, TaskEventReceiver};
pub use task_store::{InMemoryTaskStore, Task, TaskEvent, TaskStore};
