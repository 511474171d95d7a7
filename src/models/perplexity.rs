use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completions request for the research API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub reasoning_effort: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub return_citations: bool,
    pub search_recency_filter: String,
}

/// Chat completions response (non-streaming)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Raw usage object; counters vary by model
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default)]
    pub citations: Option<Vec<String>>,
}

impl ChatCompletionResponse {
    pub fn first_message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Usage counters forwarded to the agent on success
///
/// The three standard counters are always present; the research-specific
/// counters are copied only when the upstream reported them.
pub fn tool_usage(raw: Option<&Value>) -> Value {
    const EXTRA_COUNTERS: [&str; 4] = [
        "citation_tokens",
        "num_search_queries",
        "search_queries",
        "reasoning_tokens",
    ];

    let empty = Map::new();
    let usage = raw.and_then(Value::as_object).unwrap_or(&empty);

    let mut out = Map::new();
    for field in ["prompt_tokens", "completion_tokens", "total_tokens"] {
        out.insert(
            field.to_string(),
            usage.get(field).cloned().unwrap_or(Value::from(0)),
        );
    }
    for field in EXTRA_COUNTERS {
        if let Some(value) = usage.get(field).filter(|v| !v.is_null()) {
            out.insert(field.to_string(), value.clone());
        }
    }
    Value::Object(out)
}

/// Result of one deep-research tool call, returned to the model as the
/// function response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResearchOutput {
    Success {
        query: String,
        response: String,
        reasoning_effort: String,
        stream: bool,
        usage: Value,
        response_length: usize,
        message: String,
    },
    Error {
        error: String,
        error_details: String,
    },
}

impl ResearchOutput {
    pub fn error(error: impl Into<String>, error_details: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            error_details: error_details.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Usage reported by a successful call
    pub fn usage(&self) -> Option<&Value> {
        match self {
            Self::Success { usage, .. } => Some(usage),
            Self::Error { .. } => None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"status": "error", "error": e.to_string(), "error_details": ""})
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_usage_defaults_standard_counters() {
        let usage = tool_usage(None);
        assert_eq!(
            usage,
            json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0})
        );
    }

    #[test]
    fn test_tool_usage_keeps_research_counters() {
        let raw = json!({
            "prompt_tokens": 12,
            "completion_tokens": 3400,
            "total_tokens": 3412,
            "citation_tokens": 900,
            "num_search_queries": 18,
            "reasoning_tokens": null
        });
        let usage = tool_usage(Some(&raw));
        assert_eq!(usage["citation_tokens"], 900);
        assert_eq!(usage["num_search_queries"], 18);
        assert!(usage.get("reasoning_tokens").is_none());
    }

    #[test]
    fn test_output_status_tag() {
        let ok = ResearchOutput::Success {
            query: "q".to_string(),
            response: "r".to_string(),
            reasoning_effort: "high".to_string(),
            stream: false,
            usage: json!({}),
            response_length: 1,
            message: "done".to_string(),
        };
        assert_eq!(ok.to_value()["status"], "success");

        let err = ResearchOutput::error("boom", "details");
        let value = err.to_value();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "boom");
        assert!(err.usage().is_none());
    }

    #[test]
    fn test_response_parses_without_usage() {
        let raw = json!({"choices": [{"message": {"role": "assistant", "content": "report"}}]});
        let response: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.first_message().unwrap().content, "report");
        assert!(response.usage.is_none());
    }
}
