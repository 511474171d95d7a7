pub mod agent_card;
pub mod cache;
pub mod jsonrpc;
pub mod metrics_handler;

use crate::agent_card::{AgentCard, AgentCardBuilder};
use crate::cache::CacheManager;
use crate::executor::TaskExecutor;
use crate::tasks::TaskStore;
use std::sync::Arc;

/// Shared state for the request handlers
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<TaskExecutor>,
    pub tasks: Arc<TaskStore>,
    pub card: AgentCardBuilder,
    /// Shared cache (system instructions)
    pub global_cache: Arc<CacheManager<Option<String>>>,
    /// Agent descriptor cache
    pub agent_cache: Arc<CacheManager<AgentCard>>,
}
