use super::ResearchTool;
use crate::{
    config::PerplexityConfig,
    error::AppError,
    logging::redact_secrets,
    metrics,
    models::gemini::FunctionDeclaration,
    models::perplexity::{
        tool_usage, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResearchOutput,
    },
    retry::{is_retryable, retry_with_backoff, RetryPolicy},
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEEP_RESEARCH_TOOL_NAME: &str = "perplexity_deep_research_tool";

/// Reports shorter than this are logged as suspiciously short
const SHORT_RESPONSE_CHARS: usize = 1000;

/// Send one chat completions request
pub async fn chat_completions(
    client: &Client,
    config: &PerplexityConfig,
    request: &ChatCompletionRequest,
) -> Result<ChatCompletionResponse, AppError> {
    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .bearer_auth(&config.api_key)
        .header("Accept", "application/json")
        .timeout(Duration::from_secs(config.timeout_seconds))
        .json(request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::UpstreamError {
            status,
            message: redact_secrets(&error_text),
        });
    }

    let body = response.json::<ChatCompletionResponse>().await?;
    Ok(body)
}

/// Perplexity deep-research tool
pub struct PerplexityClient {
    client: Client,
    config: PerplexityConfig,
    retry: RetryPolicy,
}

impl PerplexityClient {
    pub fn new(client: Client, config: PerplexityConfig) -> Self {
        let retry = RetryPolicy::new(config.max_retries).with_base_delay(Duration::from_secs(2));
        Self {
            client,
            config,
            retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(&self, query: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.config.system_prompt.clone()),
                ChatMessage::user(query),
            ],
            stream: false,
            reasoning_effort: self.config.reasoning_effort.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            return_citations: true,
            search_recency_filter: self.config.search_recency_filter.clone(),
        }
    }

    /// Run one deep-research query
    pub async fn deep_research(&self, query: &str) -> ResearchOutput {
        info!(tool = DEEP_RESEARCH_TOOL_NAME, query_chars = query.chars().count(), "Deep research requested");

        if self.config.api_key.is_empty() {
            error!("PERPLEXITY_API_KEY is not configured");
            metrics::record_tool_call(DEEP_RESEARCH_TOOL_NAME, "error");
            return ResearchOutput::error(
                "PERPLEXITY_API_KEY is not configured",
                "Set the PERPLEXITY_API_KEY environment variable",
            );
        }

        let request = self.build_request(query);
        let result = retry_with_backoff(
            &self.retry,
            DEEP_RESEARCH_TOOL_NAME,
            |attempt| {
                info!(attempt = attempt + 1, max_attempts = self.retry.max_attempts, "Calling research API");
                chat_completions(&self.client, &self.config, &request)
            },
            is_retryable,
        )
        .await;

        let output = match result {
            Ok(response) => self.success_output(query, response),
            Err(e) => failure_output(&e, self.retry.max_attempts),
        };

        let outcome = if output.is_success() { "success" } else { "error" };
        metrics::record_tool_call(DEEP_RESEARCH_TOOL_NAME, outcome);
        output
    }

    fn success_output(&self, query: &str, response: ChatCompletionResponse) -> ResearchOutput {
        let Some(message) = response.first_message() else {
            error!("Research API response has no choices");
            let body = serde_json::to_string(&response).unwrap_or_default();
            return ResearchOutput::error(
                "No content found in the research API response",
                format!("Response body: {}", body),
            );
        };

        let content = message.content.clone();
        let response_length = content.chars().count();
        info!(response_length, "Research API call succeeded");
        if response_length < SHORT_RESPONSE_CHARS {
            warn!(response_length, "Research response is unusually short");
        }

        ResearchOutput::Success {
            query: query.to_string(),
            response: content,
            reasoning_effort: self.config.reasoning_effort.clone(),
            stream: false,
            usage: tool_usage(response.usage.as_ref()),
            response_length,
            message: "Deep research completed.".to_string(),
        }
    }
}

fn failure_output(error: &AppError, max_attempts: u32) -> ResearchOutput {
    match error {
        AppError::UpstreamError { status, message } => {
            error!(status = status.as_u16(), "Research API returned an error status");
            ResearchOutput::error(
                format!("Research API call failed: HTTP {}", status.as_u16()),
                format!("Response body: {}", message),
            )
        }
        AppError::HttpRequest(e) if e.is_timeout() => {
            error!(max_attempts, "Research API timed out on every attempt");
            ResearchOutput::error(
                format!("Research API timed out ({} attempts)", max_attempts),
                format!("Last error: {}", redact_secrets(&e.to_string())),
            )
        }
        other => {
            error!(error = %other, "Research API call failed");
            ResearchOutput::error(
                format!(
                    "Research API call failed: {}",
                    redact_secrets(&other.to_string())
                ),
                redact_secrets(&format!("{:?}", other)),
            )
        }
    }
}

#[async_trait]
impl ResearchTool for PerplexityClient {
    fn name(&self) -> &str {
        DEEP_RESEARCH_TOOL_NAME
    }

    fn pricing_model(&self) -> &str {
        &self.config.model
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: DEEP_RESEARCH_TOOL_NAME.to_string(),
            description: "Runs an in-depth web research task for the query and returns a \
                          long-form report with citations and usage counters."
                .to_string(),
            parameters: Some(json!({
                "type": "OBJECT",
                "properties": {
                    "query": {
                        "type": "STRING",
                        "description": "The research question or topic"
                    }
                },
                "required": ["query"]
            })),
        }
    }

    async fn run(&self, query: &str) -> ResearchOutput {
        self.deep_research(query).await
    }
}
