use crate::error::AppError;
use crate::models::a2a::{Task, TaskEvent};
use dashmap::DashMap;

/// In-memory task store
///
/// Every event the executor publishes is applied here, so `tasks/get`
/// reflects the latest state of both streaming and blocking requests.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: DashMap<String, Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> Result<Task, AppError> {
        self.tasks
            .get(task_id)
            .map(|task| task.clone())
            .ok_or_else(|| AppError::TaskNotFound(task_id.to_string()))
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Fold one published event into the stored task
    pub fn apply(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Task(task) => {
                self.tasks.insert(task.id.clone(), task.clone());
            }
            TaskEvent::StatusUpdate(update) => {
                if let Some(mut task) = self.tasks.get_mut(&update.task_id) {
                    if let Some(message) = &update.status.message {
                        task.history.push(message.clone());
                    }
                    task.status = update.status.clone();
                } else {
                    tracing::warn!(task_id = %update.task_id, "Status update for unknown task");
                }
            }
            TaskEvent::ArtifactUpdate(update) => {
                if let Some(mut task) = self.tasks.get_mut(&update.task_id) {
                    match task
                        .artifacts
                        .iter_mut()
                        .find(|a| a.artifact_id == update.artifact.artifact_id)
                    {
                        Some(existing) if update.append => {
                            existing.parts.extend(update.artifact.parts.iter().cloned());
                        }
                        Some(existing) => *existing = update.artifact.clone(),
                        None => task.artifacts.push(update.artifact.clone()),
                    }
                } else {
                    tracing::warn!(task_id = %update.task_id, "Artifact update for unknown task");
                }
            }
        }
    }
}
