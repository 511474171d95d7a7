/// HTTP surface tests: JSON-RPC dispatch, agent card, cache debug and metrics
mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{app_state, mount_research_flow, test_config, user_message};
use deep_research_agent::db::{AgentRecord, StaticDirectory};
use deep_research_agent::metrics::detached_handle;
use deep_research_agent::server::create_router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::MockServer;

fn router(upstream: &str, directory: StaticDirectory) -> Router {
    let cfg = test_config(upstream);
    create_router(app_state(&cfg, directory), Arc::new(detached_handle()))
}

async fn post_raw(app: Router, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn rpc(app: Router, method: &str, params: Value) -> Value {
    let body = json!({"jsonrpc": "2.0", "id": 7, "method": method, "params": params});
    let (status, value) = post_raw(app, body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    value
}

async fn get_json(app: Router, uri: &str) -> Value {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_unparseable_body_is_parse_error() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());
    let (status, value) = post_raw(app, "{not json".to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["error"]["code"], -32700);
    assert_eq!(value["id"], Value::Null);
}

#[tokio::test]
async fn test_wrong_version_is_invalid_request() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());
    let body = json!({"jsonrpc": "1.0", "id": 1, "method": "tasks/get", "params": {}});
    let (_, value) = post_raw(app, body.to_string()).await;
    assert_eq!(value["error"]["code"], -32600);
    assert_eq!(value["id"], 1);
}

#[tokio::test]
async fn test_unknown_method() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());
    let value = rpc(app, "tasks/resubscribe", json!({"id": "t"})).await;
    assert_eq!(value["error"]["code"], -32601);
    assert_eq!(value["id"], 7);
}

#[tokio::test]
async fn test_bad_params() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());
    let value = rpc(app, "message/send", json!({"message": "not a message"})).await;
    assert_eq!(value["error"]["code"], -32602);
}

#[tokio::test]
async fn test_unknown_task() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());
    let value = rpc(app.clone(), "tasks/get", json!({"id": "missing"})).await;
    assert_eq!(value["error"]["code"], -32001);

    let value = rpc(app, "tasks/cancel", json!({"id": "missing"})).await;
    assert_eq!(value["error"]["code"], -32001);
}

#[tokio::test]
async fn test_send_then_get_and_cancel() {
    let server = MockServer::start().await;
    mount_research_flow(&server, "Grid storage demand doubles by 2030.").await;
    let app = router(&server.uri(), StaticDirectory::empty());

    let params = json!({
        "message": user_message("Grid storage outlook", json!({"session_id": "s-9"})),
        "configuration": {"historyLength": 0}
    });
    let value = rpc(app.clone(), "message/send", params).await;
    let result = &value["result"];
    assert_eq!(result["kind"], "task");
    assert_eq!(result["status"]["state"], "completed");
    assert_eq!(result["history"], json!([]));
    assert_eq!(result["artifacts"][0]["name"], "deep_search_agent_result");

    let payload: Value =
        serde_json::from_str(result["artifacts"][0]["parts"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["answer"], "Grid storage demand doubles by 2030.");
    assert_eq!(payload["cost_info"]["total_cost"], 0.068);

    let task_id = result["id"].as_str().unwrap().to_string();
    let fetched = rpc(app.clone(), "tasks/get", json!({"id": task_id})).await;
    assert_eq!(fetched["result"]["status"]["state"], "completed");
    assert!(!fetched["result"]["history"].as_array().unwrap().is_empty());

    let cancelled = rpc(app, "tasks/cancel", json!({"id": task_id})).await;
    assert_eq!(cancelled["error"]["code"], -32004);
}

#[tokio::test]
async fn test_stream_emits_sse_events() {
    let server = MockServer::start().await;
    mount_research_flow(&server, "Streaming answer with enough text.").await;
    let app = router(&server.uri(), StaticDirectory::empty());

    let body = json!({
        "jsonrpc": "2.0",
        "id": "req-1",
        "method": "message/stream",
        "params": {"message": user_message("stream please", json!({}))}
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    // The stream closes itself after the final status update
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let events: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect();

    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e["id"] == "req-1"));
    assert_eq!(events[0]["result"]["kind"], "task");
    assert_eq!(events[2]["result"]["kind"], "artifact-update");
    assert_eq!(events[3]["result"]["final"], true);
    assert_eq!(events[3]["result"]["status"]["state"], "completed");
}

#[tokio::test]
async fn test_agent_card_fallback_on_both_paths() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());

    for uri in ["/.well-known/agent.json", "/.well-known/agent-card.json"] {
        let card = get_json(app.clone(), uri).await;
        assert_eq!(card["name"], "Deep Search Agent");
        assert_eq!(card["capabilities"]["streaming"], true);
        assert_eq!(card["skills"][0]["id"], "deep_search_agent");
        assert_eq!(card["defaultInputModes"], json!(["text"]));
    }
}

#[tokio::test]
async fn test_agent_card_from_registry_is_cached() {
    let record = AgentRecord {
        agent_id: 11,
        name: "Deep Search Agent".to_string(),
        description: Some("Registry description".to_string()),
        capabilities: Some(r#"{"streaming": "true", "pushNotifications": false}"#.to_string()),
        skills: Some(
            r#"[{"id": "research", "name": "Research", "description": "Web research", "tags": ["web"]}]"#
                .to_string(),
        ),
        default_input_modes: Some(r#"["text", "data"]"#.to_string()),
        default_output_modes: None,
    };
    let app = router("http://127.0.0.1:1", StaticDirectory::empty().with_record(record));

    let card = get_json(app.clone(), "/.well-known/agent.json").await;
    assert_eq!(card["description"], "Registry description");
    assert_eq!(card["capabilities"]["streaming"], true);
    assert_eq!(card["skills"][0]["tags"], json!(["web"]));
    assert_eq!(card["defaultInputModes"], json!(["text", "data"]));

    let caches = get_json(app, "/debug/cache").await;
    assert_eq!(caches["agent"]["total_items"], 1);
    assert_eq!(caches["agent"]["keys"], json!(["agent:deep_search_agent"]));
    assert_eq!(caches["global"]["total_items"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_is_text() {
    let app = router("http://127.0.0.1:1", StaticDirectory::empty());
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
