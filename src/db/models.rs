use crate::config::snake_to_title;
use serde::{Deserialize, Serialize};

/// The two spellings an agent may be registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentNames {
    /// `deep_search_agent`
    pub snake: String,
    /// `Deep Search Agent`
    pub title: String,
}

impl AgentNames {
    pub fn new(name: &str) -> Self {
        Self {
            snake: name.to_string(),
            title: snake_to_title(name),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name == self.snake || name == self.title
    }
}

/// Row of the `agents` table used to build the agent card
///
/// JSON columns are kept as raw text and parsed by the card builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentRecord {
    pub agent_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Option<String>,
    pub skills: Option<String>,
    pub default_input_modes: Option<String>,
    pub default_output_modes: Option<String>,
}

/// Peer agent endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgentUrl {
    pub base_url: String,
    pub agent_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_names() {
        let names = AgentNames::new("deep_search_agent");
        assert_eq!(names.title, "Deep Search Agent");
        assert!(names.matches("Deep Search Agent"));
        assert!(names.matches("deep_search_agent"));
        assert!(!names.matches("deep search agent"));
    }
}
