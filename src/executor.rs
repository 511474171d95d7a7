use crate::agent::{AgentEvent, DeepSearchAgent, InvokeRequest};
use crate::error::AppError;
use crate::models::a2a::{
    Artifact, Message, MessageSendParams, Task, TaskArtifactUpdateEvent, TaskEvent, TaskState,
    TaskStatus, TaskStatusUpdateEvent,
};
use crate::push::{PushNotifier, SEARCHING_MESSAGE};
use crate::tasks::TaskStore;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, Instrument};

pub const RESULT_ARTIFACT_NAME: &str = "deep_search_agent_result";
const RESULT_ARTIFACT_DESCRIPTION: &str = "Deep search agent result";

/// Routing and plan context attached to a request by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetadata {
    pub session_id: String,
    pub app_name: String,
    pub user_id: String,
    pub plan: String,
    pub next_steps: Vec<Value>,
    pub current_step: String,
    pub step_index: u64,
    pub total_steps: u64,
    pub accumulated_results: Vec<Value>,
    pub original_target: String,
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn list_of(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

impl RequestMetadata {
    pub fn from_map(metadata: Option<&Map<String, Value>>, default_app_name: &str) -> Self {
        let empty = Map::new();
        let m = metadata.unwrap_or(&empty);
        let text_or = |key: &str, default: &str| match m.get(key).and_then(Value::as_str) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        };

        Self {
            session_id: text_or("session_id", "default-session"),
            app_name: text_or("app_name", default_app_name),
            user_id: text_or("user_id", "default-user"),
            plan: text_of(m.get("plan")),
            next_steps: list_of(m.get("next_steps")),
            current_step: text_of(m.get("current_step")),
            step_index: m.get("step_index").and_then(Value::as_u64).unwrap_or(0),
            total_steps: m.get("total_steps").and_then(Value::as_u64).unwrap_or(0),
            accumulated_results: list_of(m.get("accumulated_results")),
            original_target: text_of(m.get("original_target")),
        }
    }

    pub fn has_plan(&self) -> bool {
        !self.plan.is_empty() || !self.next_steps.is_empty()
    }
}

/// Query annotated with the orchestrator's plan, when there is one
pub fn enhanced_query(query: &str, meta: &RequestMetadata) -> String {
    if !meta.has_plan() {
        return query.to_string();
    }

    let step_info = if meta.total_steps > 0 {
        format!(" (step {}/{})", meta.step_index + 1, meta.total_steps)
    } else {
        String::new()
    };
    let previous = if meta.accumulated_results.is_empty() {
        "None".to_string()
    } else {
        meta.accumulated_results
            .iter()
            .map(|result| format!("- {}", text_of(Some(result))))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Original request: {query}\n\n\
         Overall plan: {plan}\n\
         Current step: {step}{step_info}\n\n\
         Previous step results:\n\
         {previous}\n\n\
         Carry out the \"{step}\" step according to the plan above.",
        plan = meta.plan,
        step = meta.current_step,
    )
}

/// Runs research tasks and publishes their progress
pub struct TaskExecutor {
    agent: Arc<DeepSearchAgent>,
    push: PushNotifier,
    tasks: Arc<TaskStore>,
    default_app_name: String,
}

impl TaskExecutor {
    pub fn new(
        agent: Arc<DeepSearchAgent>,
        push: PushNotifier,
        tasks: Arc<TaskStore>,
        default_app_name: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            push,
            tasks,
            default_app_name: default_app_name.into(),
        }
    }

    pub fn agent(&self) -> &Arc<DeepSearchAgent> {
        &self.agent
    }

    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    fn publish(&self, sink: Option<&UnboundedSender<TaskEvent>>, event: TaskEvent) {
        self.tasks.apply(&event);
        if let Some(sink) = sink {
            // The stream consumer may have gone away; the store still has the event
            let _ = sink.send(event);
        }
    }

    /// Run the request to a terminal state and return the stored task
    pub async fn execute(
        &self,
        params: MessageSendParams,
        sink: Option<UnboundedSender<TaskEvent>>,
    ) -> Result<Task, AppError> {
        let message = params.message;
        let meta = RequestMetadata::from_map(
            message.metadata.as_ref().or(params.metadata.as_ref()),
            &self.default_app_name,
        );
        let task = Task::from_message(&message);

        let span = tracing::info_span!(
            "task",
            task_id = %task.id,
            session_id = %meta.session_id,
            app_name = %meta.app_name,
        );
        self.run(message, meta, task, sink.as_ref())
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        message: Message,
        meta: RequestMetadata,
        task: Task,
        sink: Option<&UnboundedSender<TaskEvent>>,
    ) -> Result<Task, AppError> {
        self.push
            .notify(&meta.session_id, &meta.user_id, SEARCHING_MESSAGE)
            .await;

        if !self.tasks.contains(&task.id) {
            self.publish(sink, TaskEvent::Task(task.clone()));
        }

        let query = enhanced_query(&message.text(), &meta);
        let request = InvokeRequest {
            query,
            session_id: meta.session_id.clone(),
            user_id: meta.user_id.clone(),
            app_name: meta.app_name.clone(),
            task_id: task.id.clone(),
        };

        let result = self.agent.invoke(&request, log_agent_event).await;

        match result {
            Ok(payload) => {
                let mut accumulated = String::new();
                if let Some(payload) = payload {
                    accumulated.push_str(&payload.to_json());
                    let progress = Message::agent_text(
                        format!("Searching... {} chars", accumulated.chars().count()),
                        &task.id,
                        &task.context_id,
                    );
                    self.publish(
                        sink,
                        TaskEvent::StatusUpdate(TaskStatusUpdateEvent::new(
                            &task,
                            TaskStatus::with_message(TaskState::Working, progress),
                            false,
                        )),
                    );
                }

                self.publish(
                    sink,
                    TaskEvent::ArtifactUpdate(TaskArtifactUpdateEvent::new(
                        &task,
                        Artifact::text(RESULT_ARTIFACT_NAME, RESULT_ARTIFACT_DESCRIPTION, accumulated),
                    )),
                );
                self.publish(
                    sink,
                    TaskEvent::StatusUpdate(TaskStatusUpdateEvent::new(
                        &task,
                        TaskStatus::new(TaskState::Completed),
                        true,
                    )),
                );
                info!("Task completed");
                self.tasks.get(&task.id)
            }
            Err(e) => {
                error!(error = %e, "Task failed");
                let failure = Message::agent_text(e.to_string(), &task.id, &task.context_id);
                self.publish(
                    sink,
                    TaskEvent::StatusUpdate(TaskStatusUpdateEvent::new(
                        &task,
                        TaskStatus::with_message(TaskState::Failed, failure),
                        true,
                    )),
                );
                Err(AppError::InternalError(format!(
                    "Error executing deep_search_agent: {}",
                    e
                )))
            }
        }
    }
}

fn log_agent_event(event: AgentEvent) {
    match event {
        AgentEvent::ToolCall { name, query } => {
            info!(tool = %name, query_chars = query.chars().count(), "Tool call");
        }
        AgentEvent::ToolResult { name, success, usage } => {
            info!(tool = %name, success, usage = ?usage, "Tool result");
        }
        AgentEvent::Text { text } => {
            info!(text_chars = text.chars().count(), "Agent text");
        }
    }
}
