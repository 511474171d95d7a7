//! Redaction helpers for log output
//!
//! API keys travel in headers (`Authorization: Bearer pplx-...`) and in query
//! strings (`?key=AIza...`). Anything that reaches a log line goes through
//! these helpers first.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Redacted API key: the first 8 characters followed by `***`
#[derive(Clone, Debug)]
pub struct SensitiveApiKey<'a> {
    inner: &'a str,
}

impl<'a> SensitiveApiKey<'a> {
    pub fn new(key: &'a str) -> Self {
        Self { inner: key }
    }
}

impl<'a> fmt::Display for SensitiveApiKey<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.inner.chars().take(8).collect();
        if visible.len() >= self.inner.len() {
            write!(f, "***")
        } else {
            write!(f, "{}***", visible)
        }
    }
}

/// Whether the value looks like a credential
pub fn is_sensitive_key(value: &str) -> bool {
    const SENSITIVE_PREFIXES: [&str; 5] = ["pplx-", "AIza", "sk-", "Bearer ", "ya29."];

    SENSITIVE_PREFIXES
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

/// Redact the value if it looks like a credential
pub fn sanitize_log_value(value: &str) -> String {
    if is_sensitive_key(value) {
        SensitiveApiKey::new(value).to_string()
    } else {
        value.to_string()
    }
}

/// Redact credentials embedded in free text such as URLs or error bodies
pub fn redact_secrets(text: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            r"([?&]key=)[^&\s]+",
            r"(Bearer\s+)[A-Za-z0-9._\-]+",
            r"()\bpplx-[A-Za-z0-9]+",
            r"()\bAIza[0-9A-Za-z_\-]{8,}",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    });

    patterns.iter().fold(text.to_string(), |acc, re| {
        re.replace_all(&acc, "${1}***").into_owned()
    })
}
