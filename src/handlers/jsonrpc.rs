use super::AppState;
use crate::error::{error_type_name, AppError};
use crate::metrics;
use crate::models::a2a::{
    JsonRpcRequest, JsonRpcResponse, MessageSendParams, TaskIdParams, TaskQueryParams,
    JSONRPC_VERSION,
};
use crate::streaming::create_task_sse_stream;
use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

/// JSON-RPC "Invalid Request" (malformed envelope)
const INVALID_REQUEST: i64 = -32600;

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params).map_err(|e| AppError::InvalidRequest(format!("Invalid params: {}", e)))
}

fn error_response(id: Value, error: &AppError) -> Response {
    Json(JsonRpcResponse::failure(id, error.jsonrpc_code(), error.to_string())).into_response()
}

/// Handle POST /: A2A JSON-RPC dispatch
///
/// Protocol errors are returned as JSON-RPC error objects with HTTP 200.
pub async fn handle_jsonrpc(State(state): State<AppState>, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejecting unparseable JSON-RPC body: {}", e);
            metrics::record_error("parse", "conversion_error");
            return error_response(Value::Null, &AppError::from(e));
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Json(JsonRpcResponse::failure(
            request.id,
            INVALID_REQUEST,
            format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
        ))
        .into_response();
    }

    let method = request.method.clone();
    metrics::record_request(&method);
    info!(method = %method, "JSON-RPC request");

    let id = request.id.clone();
    match dispatch(state, request).await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_error(&method, error_type_name(&e));
            error_response(id, &e)
        }
    }
}

async fn dispatch(state: AppState, request: JsonRpcRequest) -> Result<Response, AppError> {
    let JsonRpcRequest { id, method, params, .. } = request;

    match method.as_str() {
        "message/send" => {
            let params: MessageSendParams = parse_params(params)?;
            let history_length = history_length(&params);
            let task = state.executor.execute(params, None).await?;
            let result = serde_json::to_value(task.with_history_length(history_length))?;
            Ok(Json(JsonRpcResponse::success(id, result)).into_response())
        }
        "message/stream" => {
            let params: MessageSendParams = parse_params(params)?;
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let executor = state.executor.clone();
            tokio::spawn(async move {
                // Failures are already published to the stream as a failed status
                if let Err(e) = executor.execute(params, Some(tx)).await {
                    metrics::record_error("message/stream", error_type_name(&e));
                }
            });
            Ok(create_task_sse_stream(id, rx).into_response())
        }
        "tasks/get" => {
            let params: TaskQueryParams = parse_params(params)?;
            let task = state.tasks.get(&params.id)?;
            let result = serde_json::to_value(task.with_history_length(params.history_length))?;
            Ok(Json(JsonRpcResponse::success(id, result)).into_response())
        }
        "tasks/cancel" => {
            let params: TaskIdParams = parse_params(params)?;
            state.tasks.get(&params.id)?;
            Err(AppError::UnsupportedOperation(
                "Task cancellation is not supported".to_string(),
            ))
        }
        other => Err(AppError::MethodNotFound(other.to_string())),
    }
}

fn history_length(params: &MessageSendParams) -> Option<usize> {
    params
        .configuration
        .as_ref()
        .and_then(|c| c.get("historyLength"))
        .and_then(Value::as_u64)
        .map(|n| n as usize)
}
