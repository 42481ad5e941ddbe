//! Task persistence.
//!
//! The [`TaskStore`] trait is the boundary between the executor and whatever
//! keeps task records alive between requests. The core only creates, looks up
//! and overwrites records; it never deletes them.

pub mod in_memory;

pub use in_memory::InMemoryTaskStore;

use crate::errors::AgentResult;
use crate::runtime::core::status_mapper;
use a2a_types::{
    Artifact, Message, TaskArtifactUpdateEvent, TaskStatus, TaskStatusUpdateEvent, TASK_KIND,
};
use async_trait::async_trait;
use uuid::Uuid;

/// A protocol event appended to the outbound channel and to a task's history.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Snapshot announcing a newly created task.
    Task(a2a_types::Task),
    StatusUpdate(TaskStatusUpdateEvent),
    ArtifactUpdate(TaskArtifactUpdateEvent),
    Message(Message),
}

impl TaskEvent {
    /// Whether the event closes the interaction.
    pub fn is_final(&self) -> bool {
        match self {
            Self::StatusUpdate(update) => update.is_final,
            Self::Task(_) | Self::ArtifactUpdate(_) | Self::Message(_) => false,
        }
    }
}

/// One client-tracked unit of work.
///
/// Mutated only by the dispatcher; `history` is append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    pub artifacts: Vec<Artifact>,
    history: Vec<TaskEvent>,
}

impl Task {
    /// A new task in the `submitted` state with a fresh identifier.
    pub fn submitted(context_id: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), context_id)
    }

    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: status_mapper::submitted_status(),
            artifacts: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Events emitted for this task, oldest first.
    pub fn history(&self) -> &[TaskEvent] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    pub(crate) fn record(&mut self, event: TaskEvent) {
        self.history.push(event);
    }

    /// Protocol snapshot of the task.
    ///
    /// The snapshot history lists the user and agent messages seen so far,
    /// truncated to the most recent `history_length` entries when given.
    pub fn to_a2a(&self, history_length: Option<usize>) -> a2a_types::Task {
        let mut messages: Vec<Message> = self
            .history
            .iter()
            .filter_map(|event| match event {
                TaskEvent::Message(message) => Some(message.clone()),
                TaskEvent::StatusUpdate(update) => update.status.message.clone(),
                TaskEvent::Task(_) | TaskEvent::ArtifactUpdate(_) => None,
            })
            .collect();

        if let Some(limit) = history_length {
            let skip = messages.len().saturating_sub(limit);
            messages.drain(..skip);
        }

        a2a_types::Task {
            kind: TASK_KIND.to_string(),
            id: self.id.clone(),
            context_id: self.context_id.clone(),
            status: self.status.clone(),
            history: messages,
            artifacts: self.artifacts.clone(),
            metadata: None,
        }
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetches a task by identifier.
    async fn get_task(&self, task_id: &str) -> AgentResult<Option<Task>>;

    /// Fetches the most recently saved task of a context.
    async fn find_by_context(&self, context_id: &str) -> AgentResult<Option<Task>>;

    /// Inserts or overwrites a task record.
    async fn save_task(&self, task: &Task) -> AgentResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_types::{MessageRole, TaskState};

    #[test]
    fn snapshot_collects_messages_and_truncates() {
        let mut task = Task::new("t1", "c1");
        task.record(TaskEvent::Message(Message::text("m1", MessageRole::User, "hello")));
        task.record(TaskEvent::StatusUpdate(status_mapper::create_status_update_event(
            "t1",
            "c1",
            status_mapper::status(
                TaskState::Working,
                Some(status_mapper::agent_message("t1", "c1", "thinking")),
            ),
            false,
        )));
        task.record(TaskEvent::StatusUpdate(status_mapper::create_status_update_event(
            "t1",
            "c1",
            status_mapper::status(TaskState::Completed, None),
            true,
        )));

        let full = task.to_a2a(None);
        assert_eq!(full.history.len(), 2);
        assert_eq!(full.kind, TASK_KIND);

        let recent = task.to_a2a(Some(1));
        assert_eq!(recent.history.len(), 1);
        assert_eq!(recent.history[0].text_content(), "thinking");
    }

    #[test]
    fn only_final_status_updates_are_final() {
        let update = status_mapper::create_status_update_event(
            "t",
            "c",
            status_mapper::status(TaskState::Failed, None),
            true,
        );
        assert!(TaskEvent::StatusUpdate(update).is_final());
        assert!(!TaskEvent::Task(Task::new("t", "c").to_a2a(None)).is_final());
    }
}
