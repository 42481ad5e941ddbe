//! Conversions from uniform adapter states to A2A protocol types.
//!
//! Everything that builds a protocol status, message or update event for the
//! dispatcher lives here, so the rest of the runtime only deals with
//! [`UniformEvent`](crate::adapter::UniformEvent)s and the internal task record.

use crate::adapter::UniformState;
use a2a_types::{
    Artifact, Message, MessageRole, Part, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent, ARTIFACT_UPDATE_KIND, STATUS_UPDATE_KIND,
};
use uuid::Uuid;

/// Name given to the artifact that carries a completed task's answer.
pub const RESULT_ARTIFACT_NAME: &str = "result";

/// Maps a uniform state onto its A2A task state.
#[must_use]
pub const fn to_task_state(state: UniformState) -> TaskState {
    match state {
        UniformState::Working => TaskState::Working,
        UniformState::Completed => TaskState::Completed,
        UniformState::Failed => TaskState::Failed,
        UniformState::Canceled => TaskState::Canceled,
    }
}

/// Creates the initial `TaskStatus` of a freshly created task.
#[must_use]
pub fn submitted_status() -> TaskStatus {
    status(TaskState::Submitted, None)
}

/// Creates a timestamped `TaskStatus`.
#[must_use]
pub fn status(state: TaskState, message: Option<Message>) -> TaskStatus {
    TaskStatus {
        state,
        timestamp: Some(now()),
        message,
    }
}

/// Builds an agent-authored text message bound to a task.
#[must_use]
pub fn agent_message(task_id: &str, context_id: &str, content: &str) -> Message {
    Message::text(Uuid::new_v4().to_string(), MessageRole::Agent, content)
        .with_task_id(task_id)
        .with_context_id(context_id)
}

/// Wraps a final answer in the single-part text artifact of a completed task.
#[must_use]
pub fn result_artifact(content: &str) -> Artifact {
    Artifact {
        artifact_id: Uuid::new_v4().to_string(),
        parts: vec![Part::text(content)],
        name: Some(RESULT_ARTIFACT_NAME.to_string()),
        description: None,
        metadata: None,
    }
}

/// Creates a `TaskStatusUpdateEvent` from a task status.
///
/// `is_final` marks the last event of an interaction; clients stop listening
/// once they see it.
#[must_use]
pub fn create_status_update_event(
    task_id: &str,
    context_id: &str,
    status: TaskStatus,
    is_final: bool,
) -> TaskStatusUpdateEvent {
    TaskStatusUpdateEvent {
        kind: STATUS_UPDATE_KIND.to_string(),
        task_id: task_id.to_string(),
        context_id: context_id.to_string(),
        status,
        is_final,
        metadata: None,
    }
}

/// Creates a `TaskArtifactUpdateEvent` delivering a whole artifact at once.
#[must_use]
pub fn create_artifact_update_event(
    task_id: &str,
    context_id: &str,
    artifact: Artifact,
) -> TaskArtifactUpdateEvent {
    TaskArtifactUpdateEvent {
        kind: ARTIFACT_UPDATE_KIND.to_string(),
        task_id: task_id.to_string(),
        context_id: context_id.to_string(),
        artifact,
        append: Some(false),
        last_chunk: Some(true),
        metadata: None,
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
