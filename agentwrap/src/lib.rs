pub mod adapter;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod runtime;
pub mod tools;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export key error types for easier access
pub use a2a_types as a2a;
pub use errors::{AgentError, AgentResult};
