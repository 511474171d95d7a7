//! Usage counter normalization
//!
//! Upstream APIs report the same counters under different names
//! (`prompt_tokens` vs `input_tokens`, `num_search_queries` vs
//! `search_queries`). Each canonical counter has an ordered alias list and
//! the first alias present in the raw object wins.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

pub const INPUT_TOKENS: &[&str] = &["input_tokens", "prompt_tokens"];
pub const OUTPUT_TOKENS: &[&str] = &["output_tokens", "completion_tokens"];
pub const CITATION_TOKENS: &[&str] = &["citation_tokens"];
pub const SEARCH_QUERIES: &[&str] = &["search_queries", "num_search_queries"];
pub const REASONING_TOKENS: &[&str] = &["reasoning_tokens"];

/// Errors raised while normalizing a raw usage object
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("usage must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("invalid value for '{field}': expected a numeric count, found {found}")]
    InvalidCount { field: String, found: String },
}

/// Normalized usage counters
///
/// Counts are kept as `f64` so fractional or very large upstream values are
/// still billed. Whole counts serialize as JSON integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounts {
    #[serde(serialize_with = "serialize_count")]
    pub input_tokens: f64,
    #[serde(serialize_with = "serialize_count")]
    pub output_tokens: f64,
    #[serde(serialize_with = "serialize_count")]
    pub citation_tokens: f64,
    #[serde(serialize_with = "serialize_count")]
    pub search_queries: f64,
    #[serde(serialize_with = "serialize_count")]
    pub reasoning_tokens: f64,
}

/// Largest magnitude below which every whole `f64` is an exact integer
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

fn serialize_count<S: Serializer>(count: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if count.fract() == 0.0 && count.abs() < EXACT_INTEGER_LIMIT {
        serializer.serialize_i64(*count as i64)
    } else {
        serializer.serialize_f64(*count)
    }
}

impl UsageCounts {
    /// Normalize a raw usage object; missing or `null` counters are zero
    pub fn from_json(value: &Value) -> Result<Self, UsageError> {
        let map = value
            .as_object()
            .ok_or_else(|| UsageError::NotAnObject(json_type_name(value)))?;
        Self::from_map(map)
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, UsageError> {
        Ok(Self {
            input_tokens: read_count(map, INPUT_TOKENS)?,
            output_tokens: read_count(map, OUTPUT_TOKENS)?,
            citation_tokens: read_count(map, CITATION_TOKENS)?,
            search_queries: read_count(map, SEARCH_QUERIES)?,
            reasoning_tokens: read_count(map, REASONING_TOKENS)?,
        })
    }

    /// Add another bundle into this one
    pub fn accumulate(&mut self, other: &UsageCounts) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.citation_tokens += other.citation_tokens;
        self.search_queries += other.search_queries;
        self.reasoning_tokens += other.reasoning_tokens;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// (kind, count) pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("input_tokens", self.input_tokens),
            ("output_tokens", self.output_tokens),
            ("citation_tokens", self.citation_tokens),
            ("search_queries", self.search_queries),
            ("reasoning_tokens", self.reasoning_tokens),
        ]
        .into_iter()
    }
}

/// Running total over the usage reported by a stream of events
///
/// The first malformed bundle poisons the total so that the final cost
/// calculation reports the error instead of silently under-counting.
#[derive(Debug, Clone, Default)]
pub struct UsageAccumulator {
    totals: UsageCounts,
    error: Option<UsageError>,
    events: usize,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one raw usage object
    pub fn add_json(&mut self, raw: &Value) {
        if self.error.is_some() {
            return;
        }
        match UsageCounts::from_json(raw) {
            Ok(counts) => self.add(&counts),
            Err(e) => self.error = Some(e),
        }
    }

    pub fn add(&mut self, counts: &UsageCounts) {
        self.totals.accumulate(counts);
        self.events += 1;
    }

    /// Number of bundles folded in so far
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn totals(&self) -> &UsageCounts {
        &self.totals
    }

    pub fn result(&self) -> Result<UsageCounts, UsageError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.totals),
        }
    }
}

/// First alias present (and not `null`) in `map`, with the alias that matched
pub fn first_present<'m, 'a>(
    map: &'m Map<String, Value>,
    aliases: &[&'a str],
) -> Option<(&'a str, &'m Value)> {
    aliases.iter().find_map(|alias| match map.get(*alias) {
        Some(Value::Null) | None => None,
        Some(value) => Some((*alias, value)),
    })
}

fn read_count(map: &Map<String, Value>, aliases: &[&str]) -> Result<f64, UsageError> {
    match first_present(map, aliases) {
        Some((field, value)) => parse_count(field, value),
        None => Ok(0.0),
    }
}

/// Any JSON number is a count; a boolean counts as 1 or 0
fn parse_count(field: &str, value: &Value) -> Result<f64, UsageError> {
    let count = match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };

    count
        .filter(|c| c.is_finite())
        .ok_or_else(|| UsageError::InvalidCount {
            field: field.to_string(),
            found: format!("{} {}", json_type_name(value), value),
        })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
