//! Shared fixtures: a mock upstream serving the LLM, research and push APIs
#![allow(dead_code)]

use deep_research_agent::config::Config;
use deep_research_agent::db::StaticDirectory;
use deep_research_agent::handlers::AppState;
use deep_research_agent::providers::{GeminiClient, PerplexityClient};
use deep_research_agent::retry::RetryPolicy;
use deep_research_agent::server::{build_app_state, Dependencies};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GEMINI_PATH: &str = "/models/gemini-2.5-flash:generateContent";

pub fn test_config(upstream: &str) -> Config {
    let mut cfg = Config::default();
    cfg.llm.base_url = upstream.to_string();
    cfg.llm.api_key = "AIza-test-key".to_string();
    cfg.perplexity.base_url = upstream.to_string();
    cfg.perplexity.api_key = "pplx-test".to_string();
    cfg.perplexity.timeout_seconds = 5;
    cfg.push.url = format!("{}/push", upstream);
    cfg.database.enabled = false;
    cfg
}

pub fn app_state(cfg: &Config, directory: StaticDirectory) -> AppState {
    let http_client = reqwest::Client::new();
    let deps = Dependencies {
        model: Arc::new(GeminiClient::new(http_client.clone(), cfg.llm.clone())),
        tool: Arc::new(
            PerplexityClient::new(http_client.clone(), cfg.perplexity.clone())
                .with_retry_policy(RetryPolicy::new(2).with_base_delay(Duration::from_millis(1))),
        ),
        directory: Arc::new(directory),
        http_client,
    };
    build_app_state(cfg, deps)
}

pub fn user_message(text: &str, metadata: Value) -> Value {
    json!({
        "role": "user",
        "parts": [{"kind": "text", "text": text}],
        "messageId": "msg-1",
        "metadata": metadata
    })
}

fn gemini_turn(parts: Value) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": parts}}]})
}

/// LLM asks for one research call, then answers once it sees the result
pub async fn mount_research_flow(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(body_string_contains("functionResponse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_turn(json!([
            {"text": format!("```json\n{{\"answer\": \"{}\"}}\n```", answer)}
        ]))))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_turn(json!([
            {"functionCall": {"name": "perplexity_deep_research_tool", "args": {"query": "solid-state battery outlook"}}}
        ]))))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Detailed report"}}],
            "usage": {
                "prompt_tokens": 1000,
                "completion_tokens": 2000,
                "total_tokens": 3000,
                "num_search_queries": 10
            }
        })))
        .mount(server)
        .await;

    mount_push(server).await;
}

pub async fn mount_push(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/push"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}
