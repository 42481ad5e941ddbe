//! The control loop that drives an adapter and feeds the dispatcher.
//!
//! An [`AgentExecutor`] is built once per process for one adapter type and
//! shared across requests. Each request resolves (or creates) its task,
//! picks a delivery mode, runs the adapter, and hands every uniform event to
//! the [`TaskEventDispatcher`] until one of them is terminal.
//!
//! A task has at most one invocation in flight. Every write to the task,
//! whether from the invocation or from a cancel request, happens while
//! holding that invocation's writer lock, and cancel emits on the queue
//! the invocation's subscribers read.

use crate::adapter::{AgentAdapter, UniformEvent};
use crate::config::AgentConfig;
use crate::errors::{AgentError, AgentResult};
use crate::runtime::context::{
    select_delivery, DeliveryMode, QueryContext, RequestContext, TransportHints,
};
use crate::runtime::core::cancellation::cancellable;
use crate::runtime::core::dispatcher::TaskEventDispatcher;
use crate::runtime::core::status_mapper::create_status_update_event;
use crate::runtime::event_queue::EventQueue;
use crate::runtime::task_store::{Task, TaskEvent, TaskStore};
use a2a_types::{AgentCard, Message, MessageRole, TaskIdParams, TaskQueryParams};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Content of the `failed` event emitted when a stream ends without a
/// terminal event.
pub const SERVER_ERROR_MESSAGE: &str = "A server error occurred.";
/// Content of the `canceled` event emitted on a client cancel request.
pub const CANCELED_MESSAGE: &str = "Task was canceled by client.";
/// Reason attached to the error returned from every accepted cancel request.
pub const CANCEL_NOT_SUPPORTED: &str = "Cancel not supported for this agent";

/// Runs A2A requests against one [`AgentAdapter`].
pub struct AgentExecutor<A: AgentAdapter> {
    adapter: Arc<A>,
    card: AgentCard,
    streaming: bool,
    store: Arc<dyn TaskStore>,
    dispatcher: TaskEventDispatcher,
    /// task id -> the invocation currently holding it
    running: DashMap<String, Invocation>,
}

/// Handle on the invocation that owns a task.
#[derive(Debug, Clone)]
struct Invocation {
    token: CancellationToken,
    /// Queue of the request that started the invocation.
    queue: EventQueue,
    writer: Arc<Mutex<()>>,
}

impl Invocation {
    fn new(queue: &EventQueue) -> Self {
        Self {
            token: CancellationToken::new(),
            queue: queue.clone(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// The right to dispatch and save, or `None` once a cancel took the task.
    async fn write_access(&self) -> Option<MutexGuard<'_, ()>> {
        let guard = self.writer.lock().await;
        (!self.token.is_cancelled()).then_some(guard)
    }
}

impl<A: AgentAdapter> AgentExecutor<A> {
    /// Creates an executor for `adapter`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfiguration`] when `config` names a
    /// different framework than the adapter drives.
    pub fn new(adapter: A, config: &AgentConfig, store: Arc<dyn TaskStore>) -> AgentResult<Self> {
        config.ensure_framework(A::FRAMEWORK)?;

        Ok(Self {
            adapter: Arc::new(adapter),
            card: config.agent_card(),
            streaming: config.capabilities.streaming,
            store,
            dispatcher: TaskEventDispatcher::new(),
            running: DashMap::new(),
        })
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Whether the streaming capability is enabled for this agent.
    pub const fn streaming_enabled(&self) -> bool {
        self.streaming
    }

    /// Whether an invocation for `task_id` is currently in flight.
    pub fn is_running(&self, task_id: &str) -> bool {
        self.running.contains_key(task_id)
    }

    /// Delivery mode the transport selection policy picks for `hints`.
    pub fn delivery_mode(&self, hints: &TransportHints) -> DeliveryMode {
        select_delivery(self.streaming, hints)
    }

    /// Resolves the task an inbound message continues.
    ///
    /// A message naming a task must reference a stored, non-terminal task.
    /// Otherwise the latest non-terminal task of the message's context is
    /// continued; with none, [`execute`](Self::execute) creates a new task.
    ///
    /// # Errors
    ///
    /// [`AgentError::TaskNotFound`] for an unknown task id and
    /// [`AgentError::InvalidInput`] for a task that already finished.
    pub async fn prepare(
        &self,
        message: Message,
        transport: TransportHints,
    ) -> AgentResult<RequestContext> {
        let current_task = if let Some(task_id) = message.task_id.as_deref() {
            let task = self
                .store
                .get_task(task_id)
                .await?
                .ok_or_else(|| AgentError::TaskNotFound {
                    task_id: task_id.to_string(),
                })?;
            if task.is_terminal() {
                return Err(AgentError::InvalidInput(format!(
                    "Task {task_id} is in a terminal state and cannot be continued"
                )));
            }
            Some(task)
        } else if let Some(context_id) = message.context_id.as_deref() {
            self.store
                .find_by_context(context_id)
                .await?
                .filter(|task| !task.is_terminal())
        } else {
            None
        };

        let mut ctx = RequestContext::new(message).with_transport(transport);
        ctx.current_task = current_task;
        Ok(ctx)
    }

    /// Runs one client request to a terminal event.
    ///
    /// Returns the task as it stands after the run. Adapter failures are not
    /// errors here; they arrive as `failed` events.
    ///
    /// # Errors
    ///
    /// Fails on an empty query, when another invocation is already running
    /// the task, or when the task store fails.
    pub async fn execute(&self, ctx: &RequestContext, queue: &EventQueue) -> AgentResult<Task> {
        let context_id = ctx
            .context_id()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let query = QueryContext::from_request(ctx, &context_id)?;

        let mut task = self.open_task(ctx, &context_id, queue);
        let invocation = self.claim(&task.id, queue)?;

        let mode = self.delivery_mode(&ctx.transport);
        tracing::debug!(
            task_id = %task.id,
            context_id = %task.context_id,
            mode = ?mode,
            streaming_requested = query.streaming_requested,
            "selected delivery mode"
        );

        let outcome = self
            .run(ctx, &query, mode, queue, &mut task, &invocation)
            .await;
        self.running.remove(&task.id);

        match outcome? {
            RunEnd::Finished => Ok(task),
            RunEnd::Canceled => {
                tracing::debug!(task_id = %task.id, "invocation stopped by cancellation");
                Ok(self.store.get_task(&task.id).await?.unwrap_or(task))
            }
        }
    }

    /// Acknowledges a cancel request, then rejects it.
    ///
    /// A `canceled` status is emitted and saved, and a running invocation for
    /// the task stops without writing to it again. The update goes to the
    /// running invocation's queue, so its subscribers see it, and is mirrored
    /// on `queue`. Backend work already in flight is not guaranteed to stop,
    /// so the call always ends in [`AgentError::TaskNotCancelable`].
    ///
    /// # Errors
    ///
    /// Always returns an error; see above.
    pub async fn cancel(&self, ctx: &RequestContext, queue: &EventQueue) -> AgentResult<Task> {
        let context_id = ctx
            .context_id()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let task = self.open_task(ctx, &context_id, queue);
        let task_id = task.id.clone();

        // With nothing running, hold the task for the duration of the cancel.
        let (invocation, held) = match self.running.entry(task_id.clone()) {
            Entry::Occupied(running) => (running.get().clone(), false),
            Entry::Vacant(slot) => {
                let invocation = Invocation::new(queue);
                slot.insert(invocation.clone());
                (invocation, true)
            }
        };

        let result = self.cancel_invocation(ctx, queue, task, &invocation, held).await;
        if held {
            self.running.remove(&task_id);
        }
        result
    }

    /// `tasks/cancel`: looks the task up, then behaves like [`cancel`](Self::cancel).
    ///
    /// # Errors
    ///
    /// [`AgentError::TaskNotFound`] for an unknown id, otherwise always
    /// [`AgentError::TaskNotCancelable`].
    pub async fn cancel_task(&self, params: TaskIdParams, queue: &EventQueue) -> AgentResult<Task> {
        let task = self
            .store
            .get_task(&params.id)
            .await?
            .ok_or_else(|| AgentError::TaskNotFound {
                task_id: params.id.clone(),
            })?;

        let request = Message::text(Uuid::new_v4().to_string(), MessageRole::User, "")
            .with_task_id(&task.id)
            .with_context_id(&task.context_id);
        let ctx = RequestContext::new(request).with_task(task);
        self.cancel(&ctx, queue).await
    }

    /// `tasks/get`: the protocol snapshot of a stored task.
    ///
    /// # Errors
    ///
    /// [`AgentError::TaskNotFound`] for an unknown id.
    pub async fn get_task(&self, params: TaskQueryParams) -> AgentResult<a2a_types::Task> {
        let task = self
            .store
            .get_task(&params.id)
            .await?
            .ok_or_else(|| AgentError::TaskNotFound {
                task_id: params.id.clone(),
            })?;
        let history_length = params
            .history_length
            .and_then(|length| usize::try_from(length).ok());
        Ok(task.to_a2a(history_length))
    }

    /// The request's current task, or a new `submitted` one announced on the queue.
    fn open_task(&self, ctx: &RequestContext, context_id: &str, queue: &EventQueue) -> Task {
        if let Some(task) = &ctx.current_task {
            return task.clone();
        }

        let task = Task::submitted(context_id);
        tracing::info!(task_id = %task.id, context_id = %task.context_id, "created task");
        queue.enqueue(TaskEvent::Task(task.to_a2a(None)));
        task
    }

    /// Registers a new invocation for `task_id`.
    fn claim(&self, task_id: &str, queue: &EventQueue) -> AgentResult<Invocation> {
        match self.running.entry(task_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(task_id, "rejected message for a task that is already running");
                Err(AgentError::InvalidInput(format!(
                    "Task {task_id} already has an invocation in progress"
                )))
            }
            Entry::Vacant(slot) => {
                let invocation = Invocation::new(queue);
                slot.insert(invocation.clone());
                Ok(invocation)
            }
        }
    }

    async fn cancel_invocation(
        &self,
        ctx: &RequestContext,
        queue: &EventQueue,
        opened: Task,
        invocation: &Invocation,
        held: bool,
    ) -> AgentResult<Task> {
        let _writer = invocation.writer.lock().await;
        // The caller's copy may predate the invocation's last save.
        let mut task = self.store.get_task(&opened.id).await?.unwrap_or(opened);

        if task.is_terminal() {
            tracing::debug!(
                task_id = %task.id,
                state = ?task.status.state,
                "cancel requested for a finished task"
            );
            return Err(AgentError::TaskNotCancelable {
                task_id: task.id,
                reason: "Task has already reached a terminal state".to_string(),
            });
        }

        invocation.token.cancel();
        self.dispatcher.handle_event(
            UniformEvent::canceled(CANCELED_MESSAGE),
            ctx,
            &invocation.queue,
            &mut task,
        );
        self.store.save_task(&task).await?;
        if !held {
            queue.enqueue(TaskEvent::StatusUpdate(create_status_update_event(
                &task.id,
                &task.context_id,
                task.status.clone(),
                true,
            )));
        }
        tracing::warn!(task_id = %task.id, context_id = %task.context_id, "task canceled by client");

        Err(AgentError::TaskNotCancelable {
            task_id: task.id,
            reason: CANCEL_NOT_SUPPORTED.to_string(),
        })
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        query: &QueryContext,
        mode: DeliveryMode,
        queue: &EventQueue,
        task: &mut Task,
        invocation: &Invocation,
    ) -> AgentResult<RunEnd> {
        {
            let Some(_writer) = invocation.write_access().await else {
                return Ok(RunEnd::Canceled);
            };
            task.record(TaskEvent::Message(
                ctx.message
                    .clone()
                    .with_task_id(&task.id)
                    .with_context_id(&task.context_id),
            ));
            self.store.save_task(task).await?;
        }

        match mode {
            DeliveryMode::SingleShot => {
                self.run_single_shot(ctx, query, queue, task, invocation)
                    .await
            }
            DeliveryMode::Streaming => {
                self.run_streaming(ctx, query, queue, task, invocation)
                    .await
            }
        }
    }

    async fn run_single_shot(
        &self,
        ctx: &RequestContext,
        query: &QueryContext,
        queue: &EventQueue,
        task: &mut Task,
        invocation: &Invocation,
    ) -> AgentResult<RunEnd> {
        let event = tokio::select! {
            biased;
            () = invocation.token.cancelled() => return Ok(RunEnd::Canceled),
            event = self.adapter.invoke(&query.query, &query.context_id) => event,
        };

        let Some(_writer) = invocation.write_access().await else {
            return Ok(RunEnd::Canceled);
        };
        self.dispatcher.handle_event(event, ctx, queue, task);
        self.store.save_task(task).await?;
        Ok(RunEnd::Finished)
    }

    async fn run_streaming(
        &self,
        ctx: &RequestContext,
        query: &QueryContext,
        queue: &EventQueue,
        task: &mut Task,
        invocation: &Invocation,
    ) -> AgentResult<RunEnd> {
        let mut events = cancellable(
            self.adapter.stream(&query.query, &query.context_id),
            invocation.token.clone(),
        );

        while let Some(event) = events.next().await {
            let Some(_writer) = invocation.write_access().await else {
                return Ok(RunEnd::Canceled);
            };
            let is_final = self.dispatcher.handle_event(event, ctx, queue, task);
            self.store.save_task(task).await?;
            if is_final {
                return Ok(RunEnd::Finished);
            }
        }

        let Some(_writer) = invocation.write_access().await else {
            return Ok(RunEnd::Canceled);
        };
        tracing::error!(task_id = %task.id, context_id = %task.context_id, "Execution error");
        self.dispatcher
            .handle_event(UniformEvent::failed(SERVER_ERROR_MESSAGE), ctx, queue, task);
        self.store.save_task(task).await?;
        Ok(RunEnd::Finished)
    }
}

/// How an invocation stopped.
enum RunEnd {
    Finished,
    Canceled,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, Framework};
    use crate::runtime::task_store::InMemoryTaskStore;
    use crate::test_support::FakeAdapter;
    use a2a_types::TaskState;

    fn config(streaming: bool) -> AgentConfig {
        AgentConfig::new(Framework::OpenAi, "Cook", "Recipes", "http://localhost:8000/")
            .with_streaming(streaming)
    }

    fn executor(adapter: FakeAdapter, streaming: bool) -> AgentExecutor<FakeAdapter> {
        AgentExecutor::new(adapter, &config(streaming), Arc::new(InMemoryTaskStore::new()))
            .expect("executor")
    }

    fn user(text: &str) -> Message {
        Message::text("m1", MessageRole::User, text).with_context_id("ctx-1")
    }

    #[test]
    fn rejects_mismatched_framework() {
        let config = AgentConfig::new(Framework::LangGraph, "a", "b", "http://x");
        let result =
            AgentExecutor::new(FakeAdapter::default(), &config, Arc::new(InMemoryTaskStore::new()));
        assert!(matches!(result, Err(AgentError::InvalidConfiguration { .. })));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn single_shot_run_completes_task() {
        let executor = executor(
            FakeAdapter::invoking(UniformEvent::completed("Step 1: boil noodles")),
            false,
        );
        let ctx = executor
            .prepare(user("Pad Thai recipe step 1"), TransportHints::default())
            .await
            .unwrap();
        let (queue, _receiver) = EventQueue::new();

        let task = executor.execute(&ctx, &queue).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(task.context_id, "ctx-1");
        assert!(!executor.is_running(&task.id));

        let snapshot = executor
            .get_task(TaskQueryParams {
                id: task.id.clone(),
                history_length: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(snapshot.artifacts.len(), 1);
        assert_eq!(snapshot.history[0].text_content(), "Pad Thai recipe step 1");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn finished_task_is_not_continued() {
        let executor = executor(FakeAdapter::streaming(vec![UniformEvent::working("x")]), true);
        let (queue, _receiver) = EventQueue::new();
        let ctx = executor
            .prepare(user("first"), TransportHints::event_stream())
            .await
            .unwrap();
        // stream ends without a terminal event, so the task fails
        let first = executor.execute(&ctx, &queue).await.unwrap();
        assert_eq!(first.status.state, TaskState::Failed);

        let next = executor.prepare(user("again"), TransportHints::default()).await.unwrap();
        assert!(next.current_task.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_task_reference_is_rejected() {
        let executor = executor(FakeAdapter::default(), false);
        let message = user("hi").with_task_id("missing");
        let err = executor
            .prepare(message, TransportHints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::TaskNotFound { task_id } if task_id == "missing"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_query_creates_no_task() {
        let executor = executor(FakeAdapter::default(), false);
        let ctx = executor.prepare(user("  "), TransportHints::default()).await.unwrap();
        let (queue, mut receiver) = EventQueue::new();

        let err = executor.execute(&ctx, &queue).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert!(receiver.try_recv().is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancel_of_finished_task_is_logged_and_emits_nothing() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let executor = executor(FakeAdapter::invoking(UniformEvent::completed("done")), false);
        let ctx = executor.prepare(user("hello"), TransportHints::default()).await.unwrap();
        let (queue, _receiver) = EventQueue::new();
        let task = executor.execute(&ctx, &queue).await.unwrap();

        let (cancel_queue, mut cancel_receiver) = EventQueue::new();
        let err = executor
            .cancel_task(
                TaskIdParams {
                    id: task.id.clone(),
                    metadata: None,
                },
                &cancel_queue,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::TaskNotCancelable { ref reason, .. } if reason.contains("terminal state")
        ));
        assert!(cancel_receiver.try_recv().is_err());
        assert!(!executor.is_running(&task.id));

        let stored = executor.store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status.state, TaskState::Completed);

        let text = logs.text();
        assert!(text.contains("cancel requested for a finished task"), "{text}");
        assert!(text.contains(&task.id), "{text}");
    }
}
