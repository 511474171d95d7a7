use crate::cache::CacheManager;
use crate::db::{AgentDirectory, AgentNames};
use crate::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Loads the per-service system instruction for this agent
///
/// Lookups go through the shared cache so a busy service hits the database
/// at most once per cache duration. Both "no instruction configured" and
/// lookup failures resolve to `None`; the agent then runs without one.
#[derive(Clone)]
pub struct PromptLoader {
    directory: Arc<dyn AgentDirectory>,
    cache: Arc<CacheManager<Option<String>>>,
    names: AgentNames,
    duration: Duration,
}

impl PromptLoader {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        cache: Arc<CacheManager<Option<String>>>,
        agent_name: &str,
        duration: Duration,
    ) -> Self {
        Self {
            directory,
            cache,
            names: AgentNames::new(agent_name),
            duration,
        }
    }

    pub fn cache_key(&self, app_name: &str) -> String {
        format!("instruction:{}:{}", self.names.snake, app_name)
    }

    /// Instruction for `app_name`, or `None`
    pub async fn system_instruction(&self, app_name: &str) -> Option<String> {
        match self.load(app_name).await {
            Ok(instruction) => {
                debug!(
                    app_name = %app_name,
                    found = instruction.is_some(),
                    "System instruction resolved"
                );
                instruction
            }
            Err(e) => {
                error!(app_name = %app_name, error = %e, "System instruction lookup failed");
                None
            }
        }
    }

    async fn load(&self, app_name: &str) -> Result<Option<String>, AppError> {
        let key = self.cache_key(app_name);
        let directory = Arc::clone(&self.directory);
        let names = self.names.clone();

        self.cache
            .get_or_fetch(
                &key,
                || async move { directory.agent_instruction(&names, app_name).await },
                Some(self.duration),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AgentRecord, AgentUrl, StaticDirectory};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loader(directory: Arc<dyn AgentDirectory>) -> (PromptLoader, Arc<CacheManager<Option<String>>>) {
        let cache = Arc::new(CacheManager::with_duration("global", Duration::from_secs(600)));
        let loader = PromptLoader::new(
            directory,
            Arc::clone(&cache),
            "deep_search_agent",
            Duration::from_secs(600),
        );
        (loader, cache)
    }

    /// Directory that counts lookups and optionally fails them
    struct CountingDirectory {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl AgentDirectory for CountingDirectory {
        async fn agent_instruction(
            &self,
            _names: &AgentNames,
            _service_name: &str,
        ) -> Result<Option<String>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AppError::Database("connection refused".to_string()))
            } else {
                Ok(Some("Research carefully.".to_string()))
            }
        }

        async fn agent_record(&self, _names: &AgentNames) -> Result<Option<AgentRecord>, AppError> {
            Ok(None)
        }

        async fn agent_urls(&self, _service_id: i64) -> Result<Vec<AgentUrl>, AppError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_instruction_found() {
        let directory =
            StaticDirectory::empty().with_instruction("deep_search_agent", "invest-app", "Be brief.");
        let (loader, cache) = loader(Arc::new(directory));

        assert_eq!(
            loader.system_instruction("invest-app").await.as_deref(),
            Some("Be brief.")
        );
        assert_eq!(
            cache.get("instruction:deep_search_agent:invest-app"),
            Some(Some("Be brief.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_instruction_is_cached_as_none() {
        let (loader, cache) = loader(Arc::new(StaticDirectory::empty()));

        assert!(loader.system_instruction("default-app").await.is_none());
        assert_eq!(cache.get("instruction:deep_search_agent:default-app"), Some(None));
    }

    #[tokio::test]
    async fn test_lookup_is_cached() {
        let directory = Arc::new(CountingDirectory {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let (loader, _cache) = loader(directory.clone());

        loader.system_instruction("a").await;
        loader.system_instruction("a").await;
        loader.system_instruction("b").await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_returns_none_and_is_not_cached() {
        let directory = Arc::new(CountingDirectory {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (loader, cache) = loader(directory.clone());

        assert!(loader.system_instruction("a").await.is_none());
        assert!(loader.system_instruction("a").await.is_none());
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
