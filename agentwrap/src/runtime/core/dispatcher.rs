//! Translation of uniform adapter events into protocol events.

use crate::adapter::{UniformEvent, UniformState};
use crate::runtime::context::RequestContext;
use crate::runtime::core::status_mapper;
use crate::runtime::event_queue::EventQueue;
use crate::runtime::task_store::{Task, TaskEvent};

/// Owns the observable task state machine.
///
/// Each call to [`handle_event`](Self::handle_event) is a synchronous
/// translation: it updates the task record, appends the resulting protocol
/// events to the queue and the task history, and reports finality.
///
/// Repeated terminal events for the same task are not deduplicated; the
/// caller stops feeding events after the first `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskEventDispatcher;

impl TaskEventDispatcher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns `true` iff `event` moved the task into a terminal state.
    pub fn handle_event(
        &self,
        event: UniformEvent,
        ctx: &RequestContext,
        queue: &EventQueue,
        task: &mut Task,
    ) -> bool {
        let state = status_mapper::to_task_state(event.task_state);
        let is_final = event.is_terminal();

        if event.task_state == UniformState::Completed {
            let artifact = status_mapper::result_artifact(&event.content);
            task.artifacts.push(artifact.clone());
            emit(
                queue,
                task,
                TaskEvent::ArtifactUpdate(status_mapper::create_artifact_update_event(
                    &task.id,
                    &task.context_id,
                    artifact,
                )),
            );
        }

        let message = status_mapper::agent_message(&task.id, &task.context_id, &event.content);
        task.status = status_mapper::status(state, Some(message));
        let update = status_mapper::create_status_update_event(
            &task.id,
            &task.context_id,
            task.status.clone(),
            is_final,
        );
        emit(queue, task, TaskEvent::StatusUpdate(update));

        if is_final {
            tracing::info!(
                task_id = %task.id,
                context_id = %task.context_id,
                request_message_id = %ctx.message.message_id,
                state = %event.task_state,
                "task reached terminal state"
            );
        }

        is_final
    }
}

fn emit(queue: &EventQueue, task: &mut Task, event: TaskEvent) {
    task.record(event.clone());
    queue.enqueue(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_types::{Message, MessageRole, TaskState};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn context() -> RequestContext {
        RequestContext::new(Message::text("m1", MessageRole::User, "Pad Thai recipe step 1"))
    }

    fn drain(receiver: &mut UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn returns_true_only_for_terminal_states() {
        let dispatcher = TaskEventDispatcher::new();
        let ctx = context();
        let (queue, _receiver) = EventQueue::new();

        for (event, expected) in [
            (UniformEvent::working("x"), false),
            (UniformEvent::completed("x"), true),
            (UniformEvent::failed("x"), true),
            (UniformEvent::canceled("x"), true),
        ] {
            let mut task = Task::new("t", "c");
            assert_eq!(dispatcher.handle_event(event, &ctx, &queue, &mut task), expected);
        }
    }

    #[test]
    fn working_emits_non_final_status() {
        let (queue, mut receiver) = EventQueue::new();
        let mut task = Task::new("t", "c");
        TaskEventDispatcher::new().handle_event(
            UniformEvent::working("Step 1"),
            &context(),
            &queue,
            &mut task,
        );

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 1);
        let TaskEvent::StatusUpdate(update) = &events[0] else {
            panic!("expected status update, got {:?}", events[0]);
        };
        assert_eq!(update.status.state, TaskState::Working);
        assert!(!update.is_final);
        assert_eq!(
            update.status.message.as_ref().map(Message::text_content),
            Some("Step 1".to_string())
        );
        assert_eq!(task.status.state, TaskState::Working);
        assert_eq!(task.history(), events.as_slice());
    }

    #[test]
    fn completed_emits_artifact_then_final_status() {
        let (queue, mut receiver) = EventQueue::new();
        let mut task = Task::new("t", "c");
        TaskEventDispatcher::new().handle_event(
            UniformEvent::completed("Step 1: boil noodles"),
            &context(),
            &queue,
            &mut task,
        );

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 2);
        let TaskEvent::ArtifactUpdate(artifact) = &events[0] else {
            panic!("expected artifact first, got {:?}", events[0]);
        };
        assert_eq!(artifact.artifact.parts[0].as_text(), Some("Step 1: boil noodles"));
        assert!(matches!(&events[1], TaskEvent::StatusUpdate(update) if update.is_final));
        assert_eq!(task.artifacts.len(), 1);
        assert_eq!(task.status.state, TaskState::Completed);
    }

    #[test]
    fn failure_carries_diagnostic_without_artifact() {
        let (queue, mut receiver) = EventQueue::new();
        let mut task = Task::new("t", "c");
        TaskEventDispatcher::new().handle_event(
            UniformEvent::failed("Streaming error: timeout"),
            &context(),
            &queue,
            &mut task,
        );

        let events = drain(&mut receiver);
        assert_eq!(events.len(), 1);
        assert!(task.artifacts.is_empty());
        assert_eq!(task.status.state, TaskState::Failed);
    }
}
