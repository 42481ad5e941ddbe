//! Outbound event channel.
//!
//! The core only appends to the queue; the transport layer owns the receiver
//! and decides how to deliver what it reads (a JSON body, an SSE stream).

use crate::runtime::task_store::TaskEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receiving half handed to the transport.
pub type TaskEventReceiver = UnboundedReceiver<TaskEvent>;

/// Append-only sink of protocol events for one request.
#[derive(Debug, Clone)]
pub struct EventQueue {
    sender: UnboundedSender<TaskEvent>,
}

impl EventQueue {
    /// Creates a queue together with its receiver.
    #[must_use]
    pub fn new() -> (Self, TaskEventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Appends an event. Never blocks; a dropped receiver only loses the event.
    pub fn enqueue(&self, event: TaskEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("event receiver dropped; discarding task event");
        }
    }

    /// Whether the transport stopped listening.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_types::{Message, MessageRole};

    fn message(id: &str) -> TaskEvent {
        TaskEvent::Message(Message::text(id, MessageRole::Agent, id))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delivers_events_in_order() {
        let (queue, mut receiver) = EventQueue::new();
        queue.enqueue(message("a"));
        queue.enqueue(message("b"));
        drop(queue);

        assert_eq!(receiver.recv().await, Some(message("a")));
        assert_eq!(receiver.recv().await, Some(message("b")));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn closed_receiver_is_tolerated() {
        let (queue, receiver) = EventQueue::new();
        drop(receiver);
        assert!(queue.is_closed());
        queue.enqueue(message("lost"));
    }
}
