use crate::pricing::CostBreakdown;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Model text shorter than this (after trimming) is not treated as an answer
/// unless it is JSON
const MIN_ANSWER_CHARS: usize = 10;

struct Patterns {
    open_braces: Regex,
    close_braces: Regex,
    fenced_json: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                open_braces: Regex::new(r"\{\{+").ok()?,
                close_braces: Regex::new(r"\}\}+").ok()?,
                fenced_json: Regex::new(r"```json\s*(\{[\s\S]*?\})\s*```").ok()?,
            })
        })
        .as_ref()
}

/// Strip a ```` ```json ```` fence from model output
///
/// Runs of `{` or `}` are first collapsed to a single brace (templating
/// artifacts such as `{{answer}}`). If a fenced JSON object is present its
/// body is returned, otherwise the collapsed text.
pub fn extract_json_from_llm_output(text: &str) -> String {
    let Some(patterns) = patterns() else {
        return text.to_string();
    };
    let text = patterns.open_braces.replace_all(text, "{");
    let text = patterns.close_braces.replace_all(&text, "}");

    match patterns.fenced_json.captures(&text) {
        Some(caps) => caps[1].to_string(),
        None => text.into_owned(),
    }
}

/// JSON carried by model text, with the text it was parsed from
///
/// The fenced block and the whole text are tried as written first; brace
/// collapsing only applies when neither parses, so nested objects such as
/// `{"answer": {"summary": "s"}}` survive.
fn parse_model_json(text: &str) -> Result<(String, Value), String> {
    let fenced = patterns()
        .and_then(|p| p.fenced_json.captures(text))
        .map(|caps| caps[1].to_string());

    for candidate in fenced.into_iter().chain([text.trim().to_string()]) {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Ok((candidate, value));
        }
    }

    let collapsed = extract_json_from_llm_output(text);
    match serde_json::from_str::<Value>(&collapsed) {
        Ok(value) => Ok((collapsed, value)),
        Err(_) => Err(collapsed),
    }
}

/// Answer carried by a model turn, if the turn qualifies as final
///
/// JSON output yields its `answer` field (objects re-serialized) or the JSON
/// text itself. Plain text qualifies when it is longer than ten characters
/// after trimming.
pub fn final_answer(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    match parse_model_json(text) {
        Ok((json_str, Value::Object(map))) => Some(match map.get("answer") {
            Some(Value::Object(answer)) => {
                Value::String(Value::Object(answer.clone()).to_string())
            }
            Some(answer) => answer.clone(),
            None => Value::String(json_str),
        }),
        Ok((json_str, _)) => Some(Value::String(json_str)),
        Err(_) if trimmed.chars().count() > MIN_ANSWER_CHARS => {
            Some(Value::String(trimmed.to_string()))
        }
        Err(_) => None,
    }
}

/// Response body of a completed research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    pub answer: Value,
    pub cost_info: CostBreakdown,
    pub cost_summary: String,
}

impl FinalPayload {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({"answer": self.answer, "error": e.to_string()}).to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_block() {
        let text = "Here you go:\n```json\n{\"answer\": \"42\"}\n```\nThanks";
        assert_eq!(extract_json_from_llm_output(text), "{\"answer\": \"42\"}");
    }

    #[test]
    fn test_collapse_braces() {
        assert_eq!(extract_json_from_llm_output("{{{foo}}}"), "{foo}");
        assert_eq!(
            extract_json_from_llm_output("{{\"answer\": \"x\"}}"),
            "{\"answer\": \"x\"}"
        );
    }

    #[test]
    fn test_no_fence_returns_text() {
        assert_eq!(extract_json_from_llm_output("plain text"), "plain text");
    }

    #[test]
    fn test_answer_field_extracted() {
        let answer = final_answer("```json\n{\"answer\": \"The report\"}\n```");
        assert_eq!(answer, Some(json!("The report")));
    }

    #[test]
    fn test_object_answer_reserialized() {
        let answer = final_answer(r#"{"answer": {"summary": "s"}}"#).unwrap();
        assert_eq!(answer, json!(r#"{"summary":"s"}"#));
    }

    #[test]
    fn test_fenced_object_answer_reserialized() {
        let text = "Result:\n```json\n{\"answer\": {\"items\": [{\"n\": 1}]}}\n```";
        let answer = final_answer(text).unwrap();
        assert_eq!(answer, json!(r#"{"items":[{"n":1}]}"#));
    }

    #[test]
    fn test_doubled_braces_still_parse() {
        let answer = final_answer("{{\"answer\": \"templated\"}}").unwrap();
        assert_eq!(answer, json!("templated"));
    }

    #[test]
    fn test_json_without_answer_returns_json_text() {
        let answer = final_answer(r#"{"report": "r"}"#).unwrap();
        assert_eq!(answer, json!(r#"{"report": "r"}"#));
    }

    #[test]
    fn test_plain_text_threshold() {
        assert_eq!(final_answer("short one"), None);
        assert_eq!(final_answer("  "), None);
        assert_eq!(
            final_answer("  A long enough answer.  "),
            Some(json!("A long enough answer."))
        );
    }

    #[test]
    fn test_short_json_qualifies() {
        assert_eq!(final_answer("[1]"), Some(json!("[1]")));
    }
}
