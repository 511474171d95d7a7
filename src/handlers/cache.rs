use super::AppState;
use axum::{extract::State, Json};
use serde_json::{Map, Value};

/// Handle /debug/cache: read-only snapshot of both caches, keyed by cache name
pub async fn cache_info(State(state): State<AppState>) -> Json<Value> {
    let mut caches = Map::new();
    caches.insert(
        state.global_cache.name().to_string(),
        serde_json::to_value(state.global_cache.get_cache_info()).unwrap_or(Value::Null),
    );
    caches.insert(
        state.agent_cache.name().to_string(),
        serde_json::to_value(state.agent_cache.get_cache_info()).unwrap_or(Value::Null),
    );
    Json(Value::Object(caches))
}
