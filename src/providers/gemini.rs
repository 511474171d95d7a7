use super::LanguageModel;
use crate::{
    config::LlmConfig,
    error::AppError,
    logging::redact_secrets,
    models::gemini::{GenerateContentRequest, GenerateContentResponse},
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Call Gemini Generate Content API
/// Note: Model name is part of the URL path
pub async fn generate_content(
    client: &Client,
    config: &LlmConfig,
    request: &GenerateContentRequest,
) -> Result<GenerateContentResponse, AppError> {
    // Gemini API format: /v1beta/models/{model}:generateContent
    let url = format!(
        "{}/models/{}:generateContent",
        config.base_url.trim_end_matches('/'),
        config.model
    );

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(config.timeout_seconds))
        .query(&[("key", &config.api_key)])
        .json(request)
        .send()
        .await?;

    // Check for HTTP errors
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

    let body = response.json::<GenerateContentResponse>().await?;
    Ok(body)
}

/// Gemini-backed [`LanguageModel`]
pub struct GeminiClient {
    client: Client,
    config: LlmConfig,
}

impl GeminiClient {
    pub fn new(client: Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AppError> {
        if self.config.api_key.is_empty() {
            return Err(AppError::ConfigError(
                "GOOGLE_API_KEY is not configured".to_string(),
            ));
        }

        tracing::debug!(
            model = %self.config.model,
            turns = request.contents.len(),
            "Calling Gemini generateContent"
        );
        generate_content(&self.client, &self.config, request).await
    }
}
