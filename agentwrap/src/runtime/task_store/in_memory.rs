//! In-memory implementation of the [`TaskStore`] trait.

use crate::errors::AgentResult;
use crate::runtime::task_store::{Task, TaskStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// A thread-safe, process-local [`TaskStore`] backed by `DashMap`.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<DashMap<String, Task>>,
    /// context id -> id of the task saved last for that context
    by_context: Arc<DashMap<String, String>>,
}

impl InMemoryTaskStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get_task(&self, task_id: &str) -> AgentResult<Option<Task>> {
        Ok(self.tasks.get(task_id).map(|entry| entry.value().clone()))
    }

    async fn find_by_context(&self, context_id: &str) -> AgentResult<Option<Task>> {
        let Some(task_id) = self
            .by_context
            .get(context_id)
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };
        self.get_task(&task_id).await
    }

    async fn save_task(&self, task: &Task) -> AgentResult<()> {
        self.tasks.insert(task.id.clone(), task.clone());
        self.by_context
            .insert(task.context_id.clone(), task.id.clone());
        Ok(())
    }
}
