use super::output::{final_answer, FinalPayload};
use super::session::{SessionKey, SessionStore};
use crate::config::Config;
use crate::error::AppError;
use crate::metrics;
use crate::models::gemini::{
    Content, FunctionCall, FunctionResponse, GenerateContentRequest, GenerationConfig,
    SystemInstruction, Tool,
};
use crate::models::perplexity::ResearchOutput;
use crate::pricing::{format_cost_summary, CostCalculator, PricingTable, UsageAccumulator};
use crate::prompt::PromptLoader;
use crate::providers::{LanguageModel, ResearchTool};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Progress reported while a research run is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The model asked for a tool call
    ToolCall { name: String, query: String },
    /// A tool call finished; `usage` is set when the tool reported counters
    ToolResult {
        name: String,
        success: bool,
        usage: Option<Value>,
    },
    /// Text produced by the model
    Text { text: String },
}

/// One research request
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub query: String,
    pub session_id: String,
    pub user_id: String,
    pub app_name: String,
    pub task_id: String,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub name: String,
    pub max_llm_calls: u32,
    pub temperature: Option<f32>,
}

impl AgentSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            name: cfg.agent.name.clone(),
            max_llm_calls: cfg.agent.max_llm_calls,
            temperature: cfg.llm.temperature,
        }
    }
}

/// System instruction and tool set the model runs with
#[derive(Debug, Clone)]
struct AgentDefinition {
    instruction: Option<String>,
    tools: Vec<Tool>,
}

/// LLM agent that answers research queries with the deep-research tool
pub struct DeepSearchAgent {
    model: Arc<dyn LanguageModel>,
    tool: Arc<dyn ResearchTool>,
    prompts: PromptLoader,
    pricing: Arc<PricingTable>,
    sessions: SessionStore,
    definitions: DashMap<String, Arc<AgentDefinition>>,
    settings: AgentSettings,
}

impl DeepSearchAgent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tool: Arc<dyn ResearchTool>,
        prompts: PromptLoader,
        pricing: Arc<PricingTable>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            model,
            tool,
            prompts,
            pricing,
            sessions: SessionStore::new(),
            definitions: DashMap::new(),
            settings,
        }
    }

    pub fn prompts(&self) -> &PromptLoader {
        &self.prompts
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Definition for `app_name`, rebuilt when its instruction changed
    async fn refresh_definition(&self, app_name: &str) -> Arc<AgentDefinition> {
        let instruction = self.prompts.system_instruction(app_name).await;

        if let Some(current) = self.definitions.get(app_name) {
            if current.instruction == instruction {
                return Arc::clone(current.value());
            }
        }

        info!(app_name = %app_name, agent = %self.settings.name, "Rebuilding agent definition");
        let definition = Arc::new(AgentDefinition {
            instruction,
            tools: vec![Tool {
                function_declarations: vec![self.tool.declaration()],
            }],
        });
        self.definitions
            .insert(app_name.to_string(), Arc::clone(&definition));
        definition
    }

    /// Run one research query to completion
    ///
    /// Returns `None` when the model stopped without producing a qualifying
    /// answer. Exceeding the LLM call budget is an error.
    pub async fn invoke<F>(
        &self,
        request: &InvokeRequest,
        mut on_event: F,
    ) -> Result<Option<FinalPayload>, AppError>
    where
        F: FnMut(AgentEvent) + Send,
    {
        info!(
            task_id = %request.task_id,
            session_id = %request.session_id,
            user_id = %request.user_id,
            app_name = %request.app_name,
            query_chars = request.query.chars().count(),
            "Agent invoke started"
        );
        let started = Instant::now();

        let definition = self.refresh_definition(&request.app_name).await;
        let key = SessionKey::new(&request.app_name, &request.user_id, &request.session_id);
        let history = self.sessions.get_or_create(&key);
        let mut history = history.lock().await;

        history.push(Content::user_text(dated_query(&request.query)));

        let calculator = CostCalculator::from_shared(&self.pricing, self.tool.pricing_model());
        let mut usage = UsageAccumulator::new();

        let result = self
            .run_loop(&definition, &mut history, &calculator, &mut usage, &mut on_event)
            .await;

        let outcome = match &result {
            Ok(Some(_)) => "success",
            Ok(None) => "no_answer",
            Err(_) => "error",
        };
        metrics::record_duration(self.model.model_name(), outcome, started.elapsed());
        result
    }

    async fn run_loop<F>(
        &self,
        definition: &AgentDefinition,
        history: &mut Vec<Content>,
        calculator: &CostCalculator,
        usage: &mut UsageAccumulator,
        on_event: &mut F,
    ) -> Result<Option<FinalPayload>, AppError>
    where
        F: FnMut(AgentEvent) + Send,
    {
        for call in 0..self.settings.max_llm_calls {
            let request = GenerateContentRequest {
                contents: history.clone(),
                system_instruction: definition.instruction.as_deref().map(SystemInstruction::text),
                generation_config: self.settings.temperature.map(|temperature| GenerationConfig {
                    temperature: Some(temperature),
                }),
                tools: Some(definition.tools.clone()),
            };

            debug!(call = call + 1, max_calls = self.settings.max_llm_calls, "LLM call");
            let response = self.model.generate(&request).await?;
            let content = match response.first_content() {
                Some(content) => content.clone(),
                None => {
                    warn!("LLM response has no content, ending run");
                    return Ok(None);
                }
            };

            let mut turn = content.clone();
            if turn.role.is_empty() {
                turn.role = "model".to_string();
            }
            history.push(turn);

            let text = content.text();
            if !text.trim().is_empty() {
                on_event(AgentEvent::Text { text: text.clone() });
                if let Some(answer) = final_answer(&text) {
                    return Ok(Some(self.finish(answer, calculator, usage)));
                }
            }

            let calls = content.function_calls();
            if calls.is_empty() {
                warn!(text_chars = text.chars().count(), "Model stopped without an answer");
                return Ok(None);
            }

            let mut responses = Vec::with_capacity(calls.len());
            for function_call in calls {
                responses.push(self.call_tool(function_call, usage, on_event).await);
            }
            history.push(Content::function_responses(responses));
        }

        Err(AppError::InternalError(format!(
            "LLM call limit of {} exceeded",
            self.settings.max_llm_calls
        )))
    }

    async fn call_tool<F>(
        &self,
        function_call: &FunctionCall,
        usage: &mut UsageAccumulator,
        on_event: &mut F,
    ) -> FunctionResponse
    where
        F: FnMut(AgentEvent) + Send,
    {
        if function_call.name != self.tool.name() {
            warn!(tool = %function_call.name, "Model called an unknown tool");
            return FunctionResponse {
                name: function_call.name.clone(),
                response: json!({"status": "error", "error": format!("Unknown tool: {}", function_call.name)}),
            };
        }

        let query = function_call
            .args
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        on_event(AgentEvent::ToolCall {
            name: function_call.name.clone(),
            query: query.clone(),
        });

        let output = if query.trim().is_empty() {
            ResearchOutput::error("Missing required argument: query", "The tool needs a non-empty query")
        } else {
            self.tool.run(&query).await
        };

        let reported = output.usage().cloned();
        if let Some(raw) = &reported {
            usage.add_json(raw);
            debug!(usage = %raw, events = usage.events(), "Usage accumulated");
        }
        on_event(AgentEvent::ToolResult {
            name: function_call.name.clone(),
            success: output.is_success(),
            usage: reported,
        });

        FunctionResponse {
            name: function_call.name.clone(),
            response: output.to_value(),
        }
    }

    fn finish(
        &self,
        answer: Value,
        calculator: &CostCalculator,
        usage: &UsageAccumulator,
    ) -> FinalPayload {
        let cost_info = calculator.calculate_normalized(usage.result());
        metrics::record_cost(&cost_info);
        let cost_summary = format_cost_summary(&cost_info);
        FinalPayload {
            answer,
            cost_info,
            cost_summary,
        }
    }
}

/// Prefix the query with today's date so the model can reason about recency
fn dated_query(query: &str) -> String {
    let today = chrono::Local::now().format("%Y-%m-%d");
    format!("(System info) Today's date is {}.\n{}", today, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::db::StaticDirectory;
    use crate::models::gemini::{
        Candidate, FunctionDeclaration, GenerateContentResponse, Part,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Model that replays scripted turns and records every request
    struct ScriptedModel {
        turns: Mutex<VecDeque<Content>>,
        requests: Mutex<Vec<GenerateContentRequest>>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<Content>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: &GenerateContentRequest,
        ) -> Result<GenerateContentResponse, AppError> {
            self.requests.lock().unwrap().push(request.clone());
            let content = self.turns.lock().unwrap().pop_front();
            Ok(GenerateContentResponse {
                candidates: vec![Candidate {
                    content,
                    finish_reason: None,
                }],
                usage_metadata: None,
                model_version: None,
            })
        }
    }

    struct FixedTool {
        output: ResearchOutput,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResearchTool for FixedTool {
        fn name(&self) -> &str {
            "perplexity_deep_research_tool"
        }

        fn pricing_model(&self) -> &str {
            "sonar-deep-research"
        }

        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: self.name().to_string(),
                description: "research".to_string(),
                parameters: None,
            }
        }

        async fn run(&self, query: &str) -> ResearchOutput {
            self.queries.lock().unwrap().push(query.to_string());
            self.output.clone()
        }
    }

    fn model_text(text: &str) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::Text { text: text.to_string() }],
        }
    }

    fn tool_call(query: &str) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                function_call: FunctionCall {
                    name: "perplexity_deep_research_tool".to_string(),
                    args: json!({"query": query}),
                },
            }],
        }
    }

    fn success_output() -> ResearchOutput {
        ResearchOutput::Success {
            query: "q".to_string(),
            response: "report".to_string(),
            reasoning_effort: "high".to_string(),
            stream: false,
            usage: json!({"prompt_tokens": 1000, "completion_tokens": 2000, "total_tokens": 3000, "num_search_queries": 10}),
            response_length: 6,
            message: "done".to_string(),
        }
    }

    fn agent(
        model: Arc<ScriptedModel>,
        tool: Arc<FixedTool>,
        directory: StaticDirectory,
        max_llm_calls: u32,
    ) -> DeepSearchAgent {
        let prompts = PromptLoader::new(
            Arc::new(directory),
            Arc::new(CacheManager::with_duration("global", Duration::from_secs(600))),
            "deep_search_agent",
            Duration::from_secs(600),
        );
        DeepSearchAgent::new(
            model,
            tool,
            prompts,
            Arc::new(PricingTable::builtin()),
            AgentSettings {
                name: "deep_search_agent".to_string(),
                max_llm_calls,
                temperature: None,
            },
        )
    }

    fn request() -> InvokeRequest {
        InvokeRequest {
            query: "Outlook for solid-state batteries".to_string(),
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            app_name: "invest-app".to_string(),
            task_id: "t1".to_string(),
        }
    }

    fn tool(output: ResearchOutput) -> Arc<FixedTool> {
        Arc::new(FixedTool {
            output,
            queries: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_tool_call_then_answer_with_cost() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("solid-state batteries 2025"),
            model_text("```json\n{\"answer\": \"Batteries are improving.\"}\n```"),
        ]));
        let tool = tool(success_output());
        let agent = agent(model.clone(), tool.clone(), StaticDirectory::empty(), 20);

        let mut events = Vec::new();
        let payload = agent
            .invoke(&request(), |event| events.push(event))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(payload.answer, json!("Batteries are improving."));
        let usage = payload.cost_info.usage.unwrap();
        assert_eq!(usage.input_tokens, 1000.0);
        assert_eq!(usage.output_tokens, 2000.0);
        assert_eq!(usage.search_queries, 10.0);
        // 0.002 + 0.016 + 0.05
        assert_eq!(payload.cost_info.total_cost, 0.068);
        assert!(payload.cost_summary.contains("$0.068000"));

        assert_eq!(tool.queries.lock().unwrap().as_slice(), ["solid-state batteries 2025"]);
        assert!(matches!(events[0], AgentEvent::ToolCall { .. }));
        assert!(matches!(events[1], AgentEvent::ToolResult { success: true, .. }));
        assert!(matches!(events[2], AgentEvent::Text { .. }));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert_eq!(second.contents.len(), 3);
        assert!(second.contents[0].text().starts_with("(System info) Today's date is "));
        assert!(second.contents[0].text().ends_with("Outlook for solid-state batteries"));
        assert_eq!(second.tools.as_ref().unwrap()[0].function_declarations.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_tool_contributes_no_usage() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("q"),
            model_text("The research service is unavailable right now."),
        ]));
        let agent = agent(
            model,
            tool(ResearchOutput::error("timeout", "details")),
            StaticDirectory::empty(),
            20,
        );

        let payload = agent.invoke(&request(), |_| {}).await.unwrap().unwrap();
        assert_eq!(payload.cost_info.total_cost, 0.0);
        assert_eq!(payload.cost_info.total_cost_usd, "$0.000000");
        assert!(payload.cost_info.error.is_none());
    }

    #[tokio::test]
    async fn test_call_budget_exceeded() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_call("a"),
            tool_call("b"),
            tool_call("c"),
        ]));
        let agent = agent(model, tool(success_output()), StaticDirectory::empty(), 2);

        let err = agent.invoke(&request(), |_| {}).await.unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
    }

    #[tokio::test]
    async fn test_short_text_without_calls_has_no_answer() {
        let model = Arc::new(ScriptedModel::new(vec![model_text("ok")]));
        let agent = agent(model, tool(success_output()), StaticDirectory::empty(), 20);

        assert!(agent.invoke(&request(), |_| {}).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_instruction_sent_and_session_reused() {
        let model = Arc::new(ScriptedModel::new(vec![
            model_text("First answer is long enough."),
            model_text("Second answer is long enough."),
        ]));
        let directory = StaticDirectory::empty().with_instruction(
            "deep_search_agent",
            "invest-app",
            "Answer in JSON.",
        );
        let agent = agent(model.clone(), tool(success_output()), directory, 20);

        agent.invoke(&request(), |_| {}).await.unwrap();
        agent.invoke(&request(), |_| {}).await.unwrap();

        let requests = model.requests.lock().unwrap();
        let instruction = requests[0].system_instruction.as_ref().unwrap();
        assert_eq!(instruction.parts[0], Part::Text { text: "Answer in JSON.".to_string() });
        // user, model, user
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(agent.sessions().len(), 1);
    }
}
