use crate::models::a2a::{JsonRpcResponse, TaskEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde_json::Value;
use std::convert::Infallible;
use tokio::sync::mpsc::UnboundedReceiver;

/// Wrap one task event in a JSON-RPC response and render it as an SSE event
pub fn task_event_to_sse(id: &Value, event: &TaskEvent) -> Event {
    let result = serde_json::to_value(event).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize task event: {}", e);
        Value::Null
    });
    let response = JsonRpcResponse::success(id.clone(), result);
    match serde_json::to_string(&response) {
        Ok(data) => Event::default().data(data),
        Err(e) => {
            tracing::error!("Failed to serialize SSE payload: {}", e);
            Event::default().data("")
        }
    }
}

/// SSE stream of the events published for one `message/stream` request
///
/// The stream ends after the first final event or when the executor drops
/// its sender.
pub fn create_task_sse_stream(
    id: Value,
    events: UnboundedReceiver<TaskEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::unfold((events, false), move |(mut events, finished)| {
        let id = id.clone();
        async move {
            if finished {
                return None;
            }
            let event = events.recv().await?;
            let sse = task_event_to_sse(&id, &event);
            Some((Ok(sse), (events, event.is_final())))
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
