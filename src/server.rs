use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    agent::{AgentSettings, DeepSearchAgent},
    agent_card::AgentCardBuilder,
    cache::CacheManager,
    config::Config,
    db::{create_pool, AgentDirectory, MySqlDirectory, StaticDirectory},
    executor::TaskExecutor,
    handlers::{self, AppState},
    metrics,
    prompt::PromptLoader,
    providers::{GeminiClient, LanguageModel, PerplexityClient, ResearchTool},
    push::PushNotifier,
    signals::{setup_signal_handlers, shutdown_future},
    tasks::TaskStore,
};

/// Collaborators the service is assembled from
///
/// Production wiring uses [`Dependencies::from_config`]; tests substitute
/// in-memory or mocked implementations.
pub struct Dependencies {
    pub http_client: reqwest::Client,
    pub directory: Arc<dyn AgentDirectory>,
    pub model: Arc<dyn LanguageModel>,
    pub tool: Arc<dyn ResearchTool>,
}

impl Dependencies {
    /// Must be called inside a Tokio runtime (the database pool is lazy but
    /// bound to the runtime)
    pub fn from_config(config: &Config) -> Self {
        let http_client = reqwest::Client::new();

        let directory: Arc<dyn AgentDirectory> = if config.database.enabled {
            Arc::new(MySqlDirectory::new(create_pool(&config.database)))
        } else {
            info!("Database disabled, using an empty agent directory");
            Arc::new(StaticDirectory::empty())
        };

        Self {
            model: Arc::new(GeminiClient::new(http_client.clone(), config.llm.clone())),
            tool: Arc::new(PerplexityClient::new(
                http_client.clone(),
                config.perplexity.clone(),
            )),
            http_client,
            directory,
        }
    }
}

/// Build the handler state: caches, prompt loader, agent and executor
pub fn build_app_state(config: &Config, deps: Dependencies) -> AppState {
    let global_cache = Arc::new(CacheManager::new("global", config.cache.global_settings()));
    let agent_cache = Arc::new(CacheManager::new("agent", config.cache.agent_settings()));

    let prompts = PromptLoader::new(
        Arc::clone(&deps.directory),
        Arc::clone(&global_cache),
        &config.agent.name,
        config.cache.prompt_duration(),
    );
    let agent = Arc::new(DeepSearchAgent::new(
        deps.model,
        deps.tool,
        prompts,
        Arc::new(config.pricing_table()),
        AgentSettings::from_config(config),
    ));

    let tasks = Arc::new(TaskStore::new());
    let push = PushNotifier::new(deps.http_client, config.push.clone(), &config.agent.name);
    let executor = Arc::new(TaskExecutor::new(
        agent,
        push,
        Arc::clone(&tasks),
        &config.agent.app_name,
    ));

    let card = AgentCardBuilder::new(
        deps.directory,
        Arc::clone(&agent_cache),
        config.agent.clone(),
        &config.server,
    );

    AppState {
        executor,
        tasks,
        card,
        global_cache,
        agent_cache,
    }
}

/// Create the Axum router with all routes and middleware
pub fn create_router(app_state: AppState, metrics_handle: Arc<PrometheusHandle>) -> Router {
    let agent_routes = Router::new()
        .route("/", post(handlers::jsonrpc::handle_jsonrpc))
        .route("/.well-known/agent.json", get(handlers::agent_card::agent_card))
        .route(
            "/.well-known/agent-card.json",
            get(handlers::agent_card::agent_card),
        )
        .route("/debug/cache", get(handlers::cache::cache_info))
        .with_state(app_state);

    Router::new()
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(metrics_handle)
        .merge(agent_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

/// Load the system instruction for `app_name` into the global cache
///
/// Returns whether an instruction was found. A missing instruction is not
/// fatal: the agent runs without one.
pub async fn warm_instruction_cache(app_state: &AppState, app_name: &str) -> bool {
    let instruction = app_state
        .executor
        .agent()
        .prompts()
        .system_instruction(app_name)
        .await;

    match instruction {
        Some(text) => {
            info!(app_name = %app_name, chars = text.chars().count(), "System instruction preloaded");
            true
        }
        None => {
            warn!(app_name = %app_name, "No system instruction found for the default service");
            false
        }
    }
}

/// Start the deep research agent server
///
/// This function:
/// 1. Initializes metrics
/// 2. Assembles the caches, agent and executor
/// 3. Preloads the default system instruction
/// 4. Starts cache cleanup tasks and signal handlers
/// 5. Serves requests until shutdown, then flushes the caches
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);
    let pricing = config.pricing_table();
    metrics::record_agent_info(&config.agent.name, pricing.version());

    let app_state = build_app_state(&config, Dependencies::from_config(&config));

    let (global_cache, agent_cache) = (
        Arc::clone(&app_state.global_cache),
        Arc::clone(&app_state.agent_cache),
    );
    let (shutdown_tx, signal_handle) = setup_signal_handlers({
        let (global_cache, agent_cache) = (Arc::clone(&global_cache), Arc::clone(&agent_cache));
        move || {
            global_cache.flush();
            agent_cache.flush();
        }
    });

    let interval = config.cache.cleanup_interval();
    let cleanup_handles = [
        Arc::clone(&global_cache).spawn_cleanup_task(interval, shutdown_future(&shutdown_tx)),
        Arc::clone(&agent_cache).spawn_cleanup_task(interval, shutdown_future(&shutdown_tx)),
    ];

    warm_instruction_cache(&app_state, &config.agent.app_name).await;

    let app = create_router(app_state, metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting {} on {}", config.agent.title_name(), addr);
    info!(
        "Configuration: model {}, research model {}, pricing table {} ({} models), database {}",
        config.llm.model,
        config.perplexity.model,
        pricing.version(),
        pricing.models().len(),
        if config.database.enabled { "enabled" } else { "disabled" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = shutdown_future(&shutdown_tx);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    for handle in cleanup_handles {
        handle.await?;
    }
    global_cache.flush();
    agent_cache.flush();
    info!("Server stopped gracefully");

    Ok(())
}
