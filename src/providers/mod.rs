pub mod gemini;
pub mod perplexity;

use crate::error::AppError;
use crate::models::gemini::{FunctionDeclaration, GenerateContentRequest, GenerateContentResponse};
use crate::models::perplexity::ResearchOutput;
use async_trait::async_trait;

pub use gemini::GeminiClient;
pub use perplexity::PerplexityClient;

/// LLM that drives the agent loop and decides when to call tools
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Model name used in logs and metrics
    fn model_name(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AppError>;
}

/// Tool the model can call with a research query
///
/// Failures are reported inside the returned output so the model can see
/// them; `run` itself never fails.
#[async_trait]
pub trait ResearchTool: Send + Sync + 'static {
    /// Function name exposed to the model
    fn name(&self) -> &str;

    /// Model whose price list applies to the usage this tool reports
    fn pricing_model(&self) -> &str;

    fn declaration(&self) -> FunctionDeclaration;

    async fn run(&self, query: &str) -> ResearchOutput;
}
