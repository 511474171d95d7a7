use crate::cache::CacheManager;
use crate::config::{AgentConfig, ServerConfig};
use crate::db::{AgentDirectory, AgentNames, AgentRecord};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Capability descriptor published for agent discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    /// Remaining capability flags, already sanitized
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_modes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_modes: Option<Vec<String>>,
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Normalize the raw `capabilities` column
///
/// `streaming` becomes a bool; list values are kept; any other truthy value
/// becomes an empty list and falsy values are dropped.
pub fn sanitize_capabilities(raw: &Map<String, Value>) -> AgentCapabilities {
    let mut capabilities = AgentCapabilities::default();
    for (key, value) in raw {
        if key == "streaming" {
            capabilities.streaming = is_truthy(value);
        } else if value.is_array() {
            capabilities.extra.insert(key.clone(), value.clone());
        } else if is_truthy(value) {
            capabilities.extra.insert(key.clone(), Value::Array(Vec::new()));
        }
    }
    capabilities
}

fn parse_column<T: serde::de::DeserializeOwned + Default>(
    column: &str,
    raw: Option<&str>,
) -> Result<T, AppError> {
    match raw {
        None => Ok(T::default()),
        Some(text) => serde_json::from_str(text).map_err(|e| {
            AppError::ConversionError(format!("agents.{} is not valid JSON: {}", column, e))
        }),
    }
}

/// Card built from a registry row
pub fn card_from_record(
    record: &AgentRecord,
    url: &str,
    agent: &AgentConfig,
) -> Result<AgentCard, AppError> {
    let raw_capabilities: Map<String, Value> =
        parse_column("capabilities", record.capabilities.as_deref())?;

    Ok(AgentCard {
        name: record.name.clone(),
        description: record
            .description
            .clone()
            .unwrap_or_else(|| agent.description.clone()),
        url: url.to_string(),
        version: agent.version.clone(),
        default_input_modes: parse_column("default_input_modes", record.default_input_modes.as_deref())?,
        default_output_modes: parse_column(
            "default_output_modes",
            record.default_output_modes.as_deref(),
        )?,
        capabilities: sanitize_capabilities(&raw_capabilities),
        skills: parse_column("skills", record.skills.as_deref())?,
    })
}

/// Card served when the registry has no row for this agent
pub fn fallback_card(url: &str, agent: &AgentConfig) -> AgentCard {
    let title = agent.title_name();
    AgentCard {
        name: title.clone(),
        description: agent.description.clone(),
        url: url.to_string(),
        version: agent.version.clone(),
        default_input_modes: vec!["text".to_string()],
        default_output_modes: vec!["text".to_string()],
        capabilities: AgentCapabilities {
            streaming: true,
            extra: Map::new(),
        },
        skills: vec![AgentSkill {
            id: agent.name.clone(),
            name: title,
            description: agent.description.clone(),
            tags: vec!["search".to_string()],
            examples: None,
            input_modes: None,
            output_modes: None,
        }],
    }
}

/// Builds and caches the agent card
#[derive(Clone)]
pub struct AgentCardBuilder {
    directory: Arc<dyn AgentDirectory>,
    cache: Arc<CacheManager<AgentCard>>,
    agent: AgentConfig,
    url: String,
}

impl AgentCardBuilder {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        cache: Arc<CacheManager<AgentCard>>,
        agent: AgentConfig,
        server: &ServerConfig,
    ) -> Self {
        Self {
            directory,
            cache,
            agent,
            url: server.public_url(),
        }
    }

    pub fn cache_key(&self) -> String {
        format!("agent:{}", self.agent.name)
    }

    /// Current card
    ///
    /// A registry failure serves the fallback card without caching it, so
    /// the next request tries the registry again.
    pub async fn card(&self) -> AgentCard {
        let key = self.cache_key();
        let result = self
            .cache
            .get_or_fetch(&key, || self.load(), None)
            .await;

        match result {
            Ok(card) => card,
            Err(e) => {
                warn!(error = %e, "Agent card lookup failed, serving fallback card");
                fallback_card(&self.url, &self.agent)
            }
        }
    }

    async fn load(&self) -> Result<AgentCard, AppError> {
        let names = AgentNames::new(&self.agent.name);
        match self.directory.agent_record(&names).await? {
            Some(record) => {
                info!(name = %record.name, agent_id = record.agent_id, "Agent card loaded from registry");
                card_from_record(&record, &self.url, &self.agent)
            }
            None => {
                info!(agent = %self.agent.name, "No registry record, using fallback agent card");
                Ok(fallback_card(&self.url, &self.agent))
            }
        }
    }
}
