//! Axum handlers for the A2A JSON-RPC endpoint and agent card discovery.

use a2a_types::{
    A2ARequest, A2ARequestPayload, AgentCard, CancelTaskResponse, GetTaskResponse, JSONRPCId,
    MessageSendParams, SendMessageResponse, SendMessageResult,
    SendStreamingMessageResponse, SendStreamingMessageResult, TaskIdParams, TaskQueryParams,
};
use agentwrap::adapter::AgentAdapter;
use agentwrap::errors::AgentError;
use agentwrap::runtime::core::to_jsonrpc_error;
use agentwrap::runtime::{AgentExecutor, EventQueue, TaskEvent, TaskEventReceiver, TransportHints};
use async_stream::stream;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub(crate) const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Query parameters accepted on the JSON-RPC endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RpcQuery {
    pub stream: Option<String>,
}

fn transport_hints(headers: &HeaderMap, query: RpcQuery) -> TransportHints {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    TransportHints::new(accept, query.stream)
}

fn history_limit(params: &MessageSendParams) -> Option<usize> {
    params
        .configuration
        .as_ref()
        .and_then(|config| config.history_length)
        .and_then(|length| usize::try_from(length).ok())
}

/// `GET /.well-known/agent-card.json`
pub async fn agent_card_handler<A: AgentAdapter>(
    State(executor): State<Arc<AgentExecutor<A>>>,
) -> Json<AgentCard> {
    Json(executor.card().clone())
}

/// `POST /`: dispatches a JSON-RPC request by method.
pub async fn json_rpc_handler<A: AgentAdapter>(
    State(executor): State<Arc<AgentExecutor<A>>>,
    Query(query): Query<RpcQuery>,
    headers: HeaderMap,
    Json(payload): Json<A2ARequest>,
) -> Response {
    let request_id = payload.id;
    let hints = transport_hints(&headers, query);

    match payload.payload {
        A2ARequestPayload::SendMessage { params } => {
            send_message(&executor, request_id, params, hints).await
        }
        A2ARequestPayload::SendStreamingMessage { params } => {
            stream_message(executor, request_id, params, hints).await
        }
        A2ARequestPayload::GetTask { params } => get_task(&executor, request_id, params).await,
        A2ARequestPayload::CancelTask { params } => {
            cancel_task(&executor, request_id, params).await
        }
    }
}

async fn send_message<A: AgentAdapter>(
    executor: &AgentExecutor<A>,
    request_id: Option<JSONRPCId>,
    params: MessageSendParams,
    hints: TransportHints,
) -> Response {
    let history_length = history_limit(&params);
    let ctx = match executor.prepare(params.message, hints).await {
        Ok(ctx) => ctx,
        Err(error) => return send_message_error(request_id, error),
    };

    // Nobody listens to the queue here; the response is the final snapshot.
    let (queue, _receiver) = EventQueue::new();
    match executor.execute(&ctx, &queue).await {
        Ok(task) => Json(SendMessageResponse::success(
            request_id,
            SendMessageResult::Task(task.to_a2a(history_length)),
        ))
        .into_response(),
        Err(error) => send_message_error(request_id, error),
    }
}

async fn stream_message<A: AgentAdapter>(
    executor: Arc<AgentExecutor<A>>,
    request_id: Option<JSONRPCId>,
    params: MessageSendParams,
    hints: TransportHints,
) -> Response {
    if !executor.streaming_enabled() {
        return streaming_error(
            request_id,
            AgentError::UnsupportedOperation {
                operation: "message/stream".to_string(),
            },
        );
    }

    let history_length = history_limit(&params);
    let hints = TransportHints::new(
        TransportHints::event_stream().accept,
        hints.stream_param,
    );
    let ctx = match executor.prepare(params.message, hints).await {
        Ok(ctx) => ctx,
        Err(error) => return streaming_error(request_id, error),
    };

    let (queue, receiver) = EventQueue::new();
    let run = tokio::spawn(async move { executor.execute(&ctx, &queue).await });
    build_streaming_sse(request_id, receiver, run, history_length).into_response()
}

async fn get_task<A: AgentAdapter>(
    executor: &AgentExecutor<A>,
    request_id: Option<JSONRPCId>,
    params: TaskQueryParams,
) -> Response {
    let response = match executor.get_task(params).await {
        Ok(task) => GetTaskResponse::success(request_id, task),
        Err(error) => GetTaskResponse::error(request_id, to_jsonrpc_error(error)),
    };
    Json(response).into_response()
}

async fn cancel_task<A: AgentAdapter>(
    executor: &AgentExecutor<A>,
    request_id: Option<JSONRPCId>,
    params: TaskIdParams,
) -> Response {
    // A running task's subscribers get the canceled update on their own
    // queue; the response here is the JSON-RPC error alone.
    let (queue, _receiver) = EventQueue::new();
    let response = match executor.cancel_task(params, &queue).await {
        Ok(task) => CancelTaskResponse::success(request_id, task.to_a2a(None)),
        Err(error) => CancelTaskResponse::error(request_id, to_jsonrpc_error(error)),
    };
    Json(response).into_response()
}

/// Relays queued events until the final status update, then the task
/// snapshot the run returned.
fn build_streaming_sse(
    request_id: Option<JSONRPCId>,
    mut receiver: TaskEventReceiver,
    run: JoinHandle<agentwrap::AgentResult<agentwrap::runtime::Task>>,
    history_length: Option<usize>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream! {
        while let Some(event) = receiver.recv().await {
            let is_final = event.is_final();
            if let Some(evt) = task_event_to_event(&request_id, event) {
                yield Ok(evt);
            }
            if is_final {
                break;
            }
        }

        let outcome = match run.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(AgentError::from(join_error)),
        };
        let response = match outcome {
            Ok(task) => SendStreamingMessageResponse::success(
                request_id.clone(),
                SendStreamingMessageResult::Task(task.to_a2a(history_length)),
            ),
            Err(error) => {
                tracing::error!(error = %error, "streamed run failed");
                SendStreamingMessageResponse::error(request_id.clone(), to_jsonrpc_error(error))
            }
        };
        if let Some(evt) = to_sse_event(&response) {
            yield Ok(evt);
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE))
}

fn task_event_to_event(request_id: &Option<JSONRPCId>, event: TaskEvent) -> Option<Event> {
    let result = match event {
        TaskEvent::Task(task) => SendStreamingMessageResult::Task(task),
        TaskEvent::StatusUpdate(update) => SendStreamingMessageResult::TaskStatusUpdate(update),
        TaskEvent::ArtifactUpdate(update) => SendStreamingMessageResult::TaskArtifactUpdate(update),
        TaskEvent::Message(message) => SendStreamingMessageResult::Message(message),
    };
    to_sse_event(&SendStreamingMessageResponse::success(request_id.clone(), result))
}

fn to_sse_event(response: &SendStreamingMessageResponse) -> Option<Event> {
    serde_json::to_string(response)
        .ok()
        .map(|data| Event::default().data(data))
}

fn send_message_error(request_id: Option<JSONRPCId>, error: AgentError) -> Response {
    Json(SendMessageResponse::error(request_id, to_jsonrpc_error(error))).into_response()
}

fn streaming_error(request_id: Option<JSONRPCId>, error: AgentError) -> Response {
    Json(SendStreamingMessageResponse::error(
        request_id,
        to_jsonrpc_error(error),
    ))
    .into_response()
}
