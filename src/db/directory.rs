use super::connection::is_connection_error;
use super::models::{AgentNames, AgentRecord, AgentUrl};
use super::queries;
use crate::error::AppError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use std::collections::HashMap;
use std::time::Duration;

/// Read access to the agent registry
#[async_trait]
pub trait AgentDirectory: Send + Sync + 'static {
    /// Instruction mapped to the agent for `service_name`, if any
    async fn agent_instruction(
        &self,
        names: &AgentNames,
        service_name: &str,
    ) -> Result<Option<String>, AppError>;

    async fn agent_record(&self, names: &AgentNames) -> Result<Option<AgentRecord>, AppError>;

    /// Peer agents active in the service, ordered by id
    async fn agent_urls(&self, service_id: i64) -> Result<Vec<AgentUrl>, AppError>;
}

/// MySQL-backed directory
///
/// A query that fails on the connection is retried once on a fresh
/// connection before the error is returned.
pub struct MySqlDirectory {
    pool: MySqlPool,
    retry: RetryPolicy,
}

impl MySqlDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::new(2).with_base_delay(Duration::ZERO),
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl AgentDirectory for MySqlDirectory {
    async fn agent_instruction(
        &self,
        names: &AgentNames,
        service_name: &str,
    ) -> Result<Option<String>, AppError> {
        let row: Option<(Option<String>,)> = retry_with_backoff(
            &self.retry,
            "agent_instruction",
            |_| {
                sqlx::query_as(queries::GET_AGENT_INSTRUCTION)
                    .bind(&names.snake)
                    .bind(&names.title)
                    .bind(service_name)
                    .fetch_optional(&self.pool)
            },
            is_connection_error,
        )
        .await?;

        Ok(row.and_then(|(instruction,)| instruction))
    }

    async fn agent_record(&self, names: &AgentNames) -> Result<Option<AgentRecord>, AppError> {
        let record = retry_with_backoff(
            &self.retry,
            "agent_record",
            |_| {
                sqlx::query_as::<_, AgentRecord>(queries::GET_AGENT_RECORD)
                    .bind(&names.snake)
                    .bind(&names.title)
                    .fetch_optional(&self.pool)
            },
            is_connection_error,
        )
        .await?;

        Ok(record)
    }

    async fn agent_urls(&self, service_id: i64) -> Result<Vec<AgentUrl>, AppError> {
        let urls = retry_with_backoff(
            &self.retry,
            "agent_urls",
            |_| {
                sqlx::query_as::<_, AgentUrl>(queries::GET_AGENT_URLS)
                    .bind(service_id)
                    .fetch_all(&self.pool)
            },
            is_connection_error,
        )
        .await?;

        Ok(urls)
    }
}

/// In-memory directory
///
/// Used when the database is disabled (empty) and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    instructions: HashMap<(String, String), String>,
    records: Vec<AgentRecord>,
    urls: HashMap<i64, Vec<AgentUrl>>,
}

impl StaticDirectory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register an instruction for (agent name, service name)
    pub fn with_instruction(mut self, agent: &str, service: &str, instruction: &str) -> Self {
        self.instructions.insert(
            (agent.to_string(), service.to_string()),
            instruction.to_string(),
        );
        self
    }

    pub fn with_record(mut self, record: AgentRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_urls(mut self, service_id: i64, urls: Vec<AgentUrl>) -> Self {
        self.urls.insert(service_id, urls);
        self
    }
}

#[async_trait]
impl AgentDirectory for StaticDirectory {
    async fn agent_instruction(
        &self,
        names: &AgentNames,
        service_name: &str,
    ) -> Result<Option<String>, AppError> {
        let found = [&names.snake, &names.title].iter().find_map(|name| {
            self.instructions
                .get(&(name.to_string(), service_name.to_string()))
                .cloned()
        });
        Ok(found)
    }

    async fn agent_record(&self, names: &AgentNames) -> Result<Option<AgentRecord>, AppError> {
        Ok(self
            .records
            .iter()
            .find(|record| names.matches(&record.name))
            .cloned())
    }

    async fn agent_urls(&self, service_id: i64) -> Result<Vec<AgentUrl>, AppError> {
        let mut urls = self.urls.get(&service_id).cloned().unwrap_or_default();
        urls.sort_by_key(|url| url.agent_id);
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> AgentRecord {
        AgentRecord {
            agent_id: 7,
            name: name.to_string(),
            description: Some("desc".to_string()),
            capabilities: Some(r#"{"streaming": true}"#.to_string()),
            skills: Some("[]".to_string()),
            default_input_modes: Some(r#"["text"]"#.to_string()),
            default_output_modes: Some(r#"["text"]"#.to_string()),
        }
    }

    #[tokio::test]
    async fn test_static_instruction_lookup_by_either_name() {
        let directory = StaticDirectory::empty()
            .with_instruction("Deep Search Agent", "invest-app", "Be thorough.");
        let names = AgentNames::new("deep_search_agent");

        assert_eq!(
            directory.agent_instruction(&names, "invest-app").await.unwrap().as_deref(),
            Some("Be thorough.")
        );
        assert!(directory.agent_instruction(&names, "other-app").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_static_record_lookup() {
        let directory = StaticDirectory::empty().with_record(record("Deep Search Agent"));

        let found = directory
            .agent_record(&AgentNames::new("deep_search_agent"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().agent_id, 7);
        assert!(directory
            .agent_record(&AgentNames::new("geocode_agent"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_static_urls_sorted() {
        let directory = StaticDirectory::empty().with_urls(
            1,
            vec![
                AgentUrl { base_url: "http://b".to_string(), agent_id: 9 },
                AgentUrl { base_url: "http://a".to_string(), agent_id: 2 },
            ],
        );

        let urls = directory.agent_urls(1).await.unwrap();
        assert_eq!(urls[0].agent_id, 2);
        assert!(directory.agent_urls(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mysql_directory_unreachable_database_errors() {
        let cfg = crate::config::DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_seconds: 1,
            ..Default::default()
        };
        let directory = MySqlDirectory::new(super::super::create_pool(&cfg));

        let result = directory
            .agent_record(&AgentNames::new("deep_search_agent"))
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
