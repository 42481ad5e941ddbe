//! Scripted fakes for tests.
//!
//! Available under `cfg(test)` and with the `test-support` feature, so
//! downstream crates (the axum router, integration tests) can drive the
//! executor without a real backend. Every fake is `Clone` and shares its
//! script and captured calls between clones.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapter::crewai::{Crew, CrewOutput, CrewStreamItem};
use crate::adapter::langgraph::{CompiledGraph, GraphState, GraphStreamPart, StreamMode};
use crate::adapter::openai_agents::{AgentRunner, RunStreamEvent};
use crate::adapter::{AgentAdapter, AgentInput, BackendStream, UniformEvent, UniformEventStream};
use crate::config::Framework;
use crate::errors::{AgentError, AgentResult};
use crate::models::{ChatRequest, CompletionClient};
use crate::tools::post_search::{PostSource, RedditPost};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().expect("fake state mutex poisoned")
}

/// Replays a script of backend items. Each streamed run consumes the script.
fn replay<T: Send + 'static>(script: &Mutex<Vec<AgentResult<T>>>) -> BackendStream<T> {
    let items = std::mem::take(&mut *lock(script));
    Box::pin(stream::iter(items))
}

// ============================================================================
// Backends
// ============================================================================

/// An [`AgentRunner`] answering with a fixed result.
#[derive(Clone)]
pub struct FakeRunner {
    answer: Arc<Mutex<AgentResult<String>>>,
    script: Arc<Mutex<Vec<AgentResult<RunStreamEvent>>>>,
    inputs: Arc<Mutex<Vec<AgentInput>>>,
}

impl FakeRunner {
    fn new(answer: AgentResult<String>, script: Vec<AgentResult<RunStreamEvent>>) -> Self {
        Self {
            answer: Arc::new(Mutex::new(answer)),
            script: Arc::new(Mutex::new(script)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn answering(text: impl Into<String>) -> Self {
        Self::new(Ok(text.into()), Vec::new())
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(Err(AgentError::backend(message)), Vec::new())
    }

    #[must_use]
    pub fn streaming(events: Vec<AgentResult<RunStreamEvent>>) -> Self {
        Self::new(Ok(String::new()), events)
    }

    /// Inputs of every run started so far.
    #[must_use]
    pub fn inputs(&self) -> Vec<AgentInput> {
        lock(&self.inputs).clone()
    }
}

fn clone_result(result: &AgentResult<String>) -> AgentResult<String> {
    match result {
        Ok(text) => Ok(text.clone()),
        Err(err) => Err(AgentError::backend(err.to_string())),
    }
}

#[async_trait]
impl AgentRunner for FakeRunner {
    async fn run(&self, input: &AgentInput) -> AgentResult<String> {
        lock(&self.inputs).push(input.clone());
        clone_result(&lock(&self.answer))
    }

    async fn run_streamed(&self, input: &AgentInput) -> AgentResult<BackendStream<RunStreamEvent>> {
        lock(&self.inputs).push(input.clone());
        Ok(replay(&self.script))
    }
}

/// A [`Crew`] with a fixed output or a scripted stream.
#[derive(Clone)]
pub struct FakeCrew {
    output: Arc<Mutex<CrewOutput>>,
    script: Arc<Mutex<Vec<AgentResult<CrewStreamItem>>>>,
    inputs: Arc<Mutex<Vec<AgentInput>>>,
}

impl FakeCrew {
    fn new(raw: String, script: Vec<AgentResult<CrewStreamItem>>) -> Self {
        Self {
            output: Arc::new(Mutex::new(CrewOutput { raw, json: None })),
            script: Arc::new(Mutex::new(script)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn answering(raw: impl Into<String>) -> Self {
        Self::new(raw.into(), Vec::new())
    }

    #[must_use]
    pub fn streaming(items: Vec<AgentResult<CrewStreamItem>>) -> Self {
        Self::new(String::new(), items)
    }

    #[must_use]
    pub fn inputs(&self) -> Vec<AgentInput> {
        lock(&self.inputs).clone()
    }
}

#[async_trait]
impl Crew for FakeCrew {
    async fn kickoff(&self, input: &AgentInput) -> AgentResult<CrewOutput> {
        lock(&self.inputs).push(input.clone());
        Ok(lock(&self.output).clone())
    }

    async fn kickoff_streamed(
        &self,
        input: &AgentInput,
    ) -> AgentResult<BackendStream<CrewStreamItem>> {
        lock(&self.inputs).push(input.clone());
        Ok(replay(&self.script))
    }
}

/// A [`CompiledGraph`] with a fixed end state or a scripted stream.
#[derive(Clone)]
pub struct FakeGraph {
    state: Arc<Mutex<GraphState>>,
    script: Arc<Mutex<Vec<AgentResult<GraphStreamPart>>>>,
    inputs: Arc<Mutex<Vec<AgentInput>>>,
    modes: Arc<Mutex<Vec<StreamMode>>>,
}

impl FakeGraph {
    fn new(state: GraphState, script: Vec<AgentResult<GraphStreamPart>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            script: Arc::new(Mutex::new(script)),
            inputs: Arc::new(Mutex::new(Vec::new())),
            modes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_state(state: GraphState) -> Self {
        Self::new(state, Vec::new())
    }

    #[must_use]
    pub fn streaming(parts: Vec<AgentResult<GraphStreamPart>>) -> Self {
        Self::new(GraphState::default(), parts)
    }

    #[must_use]
    pub fn inputs(&self) -> Vec<AgentInput> {
        lock(&self.inputs).clone()
    }

    /// Stream modes requested by the most recent streamed run.
    #[must_use]
    pub fn requested_modes(&self) -> Vec<StreamMode> {
        lock(&self.modes).clone()
    }
}

#[async_trait]
impl CompiledGraph for FakeGraph {
    async fn invoke(&self, input: &AgentInput) -> AgentResult<GraphState> {
        lock(&self.inputs).push(input.clone());
        Ok(lock(&self.state).clone())
    }

    async fn stream(
        &self,
        input: &AgentInput,
        modes: &[StreamMode],
    ) -> AgentResult<BackendStream<GraphStreamPart>> {
        lock(&self.inputs).push(input.clone());
        *lock(&self.modes) = modes.to_vec();
        Ok(replay(&self.script))
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// An [`AgentAdapter`] that returns scripted uniform events directly.
///
/// `invoke` returns the configured event; `stream` replays the configured
/// events and then either ends or, with [`hang_after_script`](Self::hang_after_script),
/// never yields again.
#[derive(Clone)]
pub struct FakeAdapter {
    invoke_event: Arc<Mutex<UniformEvent>>,
    stream_events: Arc<Mutex<Vec<UniformEvent>>>,
    hang: bool,
    invoke_delay: Option<Duration>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for FakeAdapter {
    fn default() -> Self {
        Self {
            invoke_event: Arc::new(Mutex::new(UniformEvent::completed("ok"))),
            stream_events: Arc::new(Mutex::new(vec![UniformEvent::completed("ok")])),
            hang: false,
            invoke_delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeAdapter {
    #[must_use]
    pub fn invoking(event: UniformEvent) -> Self {
        let adapter = Self::default();
        *lock(&adapter.invoke_event) = event;
        adapter
    }

    #[must_use]
    pub fn streaming(events: Vec<UniformEvent>) -> Self {
        Self::default().with_stream(events)
    }

    /// Replaces the events `stream` replays.
    #[must_use]
    pub fn with_stream(self, events: Vec<UniformEvent>) -> Self {
        *lock(&self.stream_events) = events;
        self
    }

    /// Makes the stream stall forever once the script is exhausted.
    #[must_use]
    pub fn hang_after_script(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Delays `invoke` by `delay` before answering.
    #[must_use]
    pub fn with_invoke_delay(mut self, delay: Duration) -> Self {
        self.invoke_delay = Some(delay);
        self
    }

    /// `(query, context_id)` of every invocation, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl AgentAdapter for FakeAdapter {
    const FRAMEWORK: Framework = Framework::OpenAi;

    async fn invoke(&self, query: &str, context_id: &str) -> UniformEvent {
        lock(&self.calls).push((query.to_string(), context_id.to_string()));
        if let Some(delay) = self.invoke_delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.invoke_event).clone()
    }

    fn stream(&self, query: &str, context_id: &str) -> UniformEventStream {
        lock(&self.calls).push((query.to_string(), context_id.to_string()));
        let events = stream::iter(lock(&self.stream_events).clone());
        if self.hang {
            Box::pin(events.chain(stream::pending()))
        } else {
            Box::pin(events)
        }
    }
}

// ============================================================================
// Tools
// ============================================================================

/// A [`CompletionClient`] answering from a queue or a responder function.
///
/// Captures every request and tracks the peak number of concurrent calls.
#[derive(Clone)]
pub struct FakeCompletionClient {
    responses: Arc<Mutex<VecDeque<AgentResult<String>>>>,
    responder: Option<Arc<dyn Fn(&ChatRequest) -> AgentResult<String> + Send + Sync>>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeCompletionClient {
    fn build(
        responses: VecDeque<AgentResult<String>>,
        responder: Option<Arc<dyn Fn(&ChatRequest) -> AgentResult<String> + Send + Sync>>,
    ) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            responder,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Dequeues one response per call; errors once exhausted.
    #[must_use]
    pub fn with_responses<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = AgentResult<String>>,
    {
        Self::build(responses.into_iter().collect(), None)
    }

    /// Computes each response from the request.
    #[must_use]
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ChatRequest) -> AgentResult<String> + Send + Sync + 'static,
    {
        Self::build(VecDeque::new(), Some(Arc::new(responder)))
    }

    /// Holds every call open for `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    /// Highest number of calls observed in flight at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for FakeCompletionClient {
    async fn complete(&self, request: ChatRequest) -> AgentResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = match &self.responder {
            Some(responder) => responder(&request),
            None => lock(&self.responses)
                .pop_front()
                .unwrap_or_else(|| {
                    Err(AgentError::Internal {
                        component: "fake_completion_client".into(),
                        reason: "no scripted responses left".into(),
                    })
                }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// A [`PostSource`] keyed by `(subreddit, query)`.
#[derive(Clone, Default)]
pub struct FakePostSource {
    results: Arc<Mutex<HashMap<(String, String), Result<Vec<RedditPost>, String>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakePostSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_results(self, subreddit: &str, query: &str, posts: Vec<RedditPost>) -> Self {
        lock(&self.results).insert((subreddit.to_string(), query.to_string()), Ok(posts));
        self
    }

    #[must_use]
    pub fn with_failure(self, subreddit: &str, query: &str, message: &str) -> Self {
        lock(&self.results).insert(
            (subreddit.to_string(), query.to_string()),
            Err(message.to_string()),
        );
        self
    }

    /// `(subreddit, query)` of every search, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl PostSource for FakePostSource {
    async fn search(
        &self,
        subreddit: &str,
        query: &str,
        limit: u32,
    ) -> AgentResult<Vec<RedditPost>> {
        let key = (subreddit.to_string(), query.to_string());
        lock(&self.calls).push(key.clone());
        match lock(&self.results).get(&key) {
            Some(Ok(posts)) => Ok(posts.iter().take(limit as usize).cloned().collect()),
            Some(Err(message)) => Err(AgentError::Network {
                operation: "reddit_search".into(),
                reason: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}
