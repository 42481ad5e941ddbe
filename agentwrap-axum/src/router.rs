//! Router assembly.

use crate::handlers::{agent_card_handler, json_rpc_handler};
use agentwrap::adapter::AgentAdapter;
use agentwrap::runtime::AgentExecutor;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";
/// Card location used by older A2A clients.
pub const LEGACY_AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Exposes one [`AgentExecutor`] over A2A JSON-RPC and SSE.
///
/// Only builds the [`Router`]; binding a listener is up to the caller:
///
/// ```ignore
/// let router = A2ARouter::new(Arc::new(executor)).into_router();
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
/// axum::serve(listener, router).await?;
/// ```
pub struct A2ARouter<A: AgentAdapter> {
    executor: Arc<AgentExecutor<A>>,
}

impl<A: AgentAdapter> A2ARouter<A> {
    pub fn new(executor: Arc<AgentExecutor<A>>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<AgentExecutor<A>> {
        &self.executor
    }

    pub fn into_router(self) -> Router {
        let card = self.executor.card();
        tracing::info!(
            agent = %card.name,
            url = %card.url,
            streaming = self.executor.streaming_enabled(),
            "A2A router ready"
        );

        Router::new()
            .route("/", post(json_rpc_handler::<A>))
            .route(AGENT_CARD_PATH, get(agent_card_handler::<A>))
            .route(LEGACY_AGENT_CARD_PATH, get(agent_card_handler::<A>))
            .with_state(self.executor)
            .layer(TraceLayer::new_for_http())
    }
}
