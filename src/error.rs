use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Configuration error
    ConfigError(String),
    /// Malformed request or parameters
    InvalidRequest(String),
    /// Unknown JSON-RPC method
    MethodNotFound(String),
    /// Task id not present in the task store
    TaskNotFound(String),
    /// Operation the agent does not support (e.g. task cancellation)
    UnsupportedOperation(String),
    /// Protocol conversion error
    ConversionError(String),
    /// Upstream API error
    UpstreamError { status: StatusCode, message: String },
    /// Database error
    Database(String),
    /// Internal server error
    InternalError(String),
    /// HTTP request error (preserves reqwest::Error for retry classification)
    HttpRequest(reqwest::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::MethodNotFound(method) => write!(f, "Method not found: {}", method),
            Self::TaskNotFound(id) => write!(f, "Task not found: {}", id),
            Self::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            Self::ConversionError(msg) => write!(f, "Conversion error: {}", msg),
            Self::UpstreamError { status, message } => {
                write!(f, "Upstream error ({}): {}", status, message)
            }
            Self::Database(msg) => write!(f, "Database error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
            Self::HttpRequest(err) => write!(f, "HTTP request error: {}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status used when the error is returned outside a JSON-RPC envelope
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotFound(_) => StatusCode::NOT_FOUND,
            Self::TaskNotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedOperation(_) => StatusCode::NOT_IMPLEMENTED,
            Self::ConversionError(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamError { status, .. } => *status,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::HttpRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// JSON-RPC 2.0 error code (A2A reserves -32001..-32099 for task errors)
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            Self::InvalidRequest(_) => -32602,
            Self::MethodNotFound(_) => -32601,
            Self::ConversionError(_) => -32700,
            Self::TaskNotFound(_) => -32001,
            Self::UnsupportedOperation(_) => -32004,
            _ => -32603,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

pub fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::ConfigError(_) => "config_error",
        AppError::InvalidRequest(_) => "invalid_request",
        AppError::MethodNotFound(_) => "method_not_found",
        AppError::TaskNotFound(_) => "task_not_found",
        AppError::UnsupportedOperation(_) => "unsupported_operation",
        AppError::ConversionError(_) => "conversion_error",
        AppError::UpstreamError { .. } => "upstream_error",
        AppError::Database(_) => "database_error",
        AppError::InternalError(_) => "internal_error",
        AppError::HttpRequest(_) => "http_request_error",
    }
}

// Implement conversions from common error types
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpRequest(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConversionError(format!("JSON error: {}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
