//! Axum embedding for `agentwrap` executors.
//!
//! [`A2ARouter`] serves:
//! - `POST /`: A2A JSON-RPC (`message/send`, `message/stream`, `tasks/get`,
//!   `tasks/cancel`). Streaming answers are Server-Sent Events.
//! - `GET /.well-known/agent-card.json` and the legacy `/.well-known/agent.json`.

pub mod handlers;
pub mod router;

pub use router::{A2ARouter, AGENT_CARD_PATH, LEGACY_AGENT_CARD_PATH};
