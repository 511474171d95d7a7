use crate::cache::{CacheSettings, ExpiryPolicy};
use crate::pricing::{ModelPrice, PricingTable, DEFAULT_PRICING_MODEL};
use config::builder::{ConfigBuilder, DefaultState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub perplexity: PerplexityConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL advertised in the agent card
    pub fn public_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Shared cache default (`GLOBAL_CACHE_DURATION`)
    #[serde(default = "default_cache_duration")]
    pub global_duration_seconds: u64,
    /// Agent descriptor cache default (`AGENT_CACHE_DURATION`)
    #[serde(default = "default_cache_duration")]
    pub agent_duration_seconds: u64,
    /// Duration passed by the prompt loader for instruction lookups
    #[serde(default = "default_cache_duration")]
    pub prompt_duration_seconds: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,
    #[serde(default)]
    pub single_flight: bool,
}

impl CacheConfig {
    pub fn global_settings(&self) -> CacheSettings {
        self.settings(self.global_duration_seconds)
    }

    pub fn agent_settings(&self) -> CacheSettings {
        self.settings(self.agent_duration_seconds)
    }

    pub fn prompt_duration(&self) -> Duration {
        Duration::from_secs(self.prompt_duration_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    fn settings(&self, seconds: u64) -> CacheSettings {
        CacheSettings {
            default_duration: Duration::from_secs(seconds),
            expiry_policy: self.expiry_policy,
            single_flight: self.single_flight,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            global_duration_seconds: default_cache_duration(),
            agent_duration_seconds: default_cache_duration(),
            prompt_duration_seconds: default_cache_duration(),
            cleanup_interval_seconds: default_cleanup_interval(),
            expiry_policy: ExpiryPolicy::default(),
            single_flight: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_pool_recycle")]
    pub pool_recycle_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            name: default_db_name(),
            pool_recycle_seconds: default_pool_recycle(),
            max_connections: default_max_connections(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Snake-case agent name; also the database lookup key
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_agent_description")]
    pub description: String,
    #[serde(default = "default_agent_version")]
    pub version: String,
    /// Service name used when a request carries no `app_name`
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_max_llm_calls")]
    pub max_llm_calls: u32,
    /// Model whose prices apply to the research tool usage
    #[serde(default = "default_pricing_model")]
    pub pricing_model: String,
}

impl AgentConfig {
    /// `deep_search_agent` -> `Deep Search Agent`
    pub fn title_name(&self) -> String {
        snake_to_title(&self.name)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: default_agent_description(),
            version: default_agent_version(),
            app_name: default_app_name(),
            max_llm_calls: default_max_llm_calls(),
            pricing_model: default_pricing_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// `GOOGLE_API_KEY`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_seconds: default_llm_timeout(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerplexityConfig {
    #[serde(default = "default_perplexity_base_url")]
    pub base_url: String,
    /// `PERPLEXITY_API_KEY`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_pricing_model")]
    pub model: String,
    #[serde(default = "default_perplexity_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_reasoning_effort")]
    pub reasoning_effort: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_perplexity_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_recency_filter")]
    pub search_recency_filter: String,
    #[serde(default = "default_research_system_prompt")]
    pub system_prompt: String,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            base_url: default_perplexity_base_url(),
            api_key: String::new(),
            model: default_pricing_model(),
            timeout_seconds: default_perplexity_timeout(),
            max_retries: default_max_retries(),
            reasoning_effort: default_reasoning_effort(),
            max_tokens: default_max_tokens(),
            temperature: default_perplexity_temperature(),
            top_p: default_top_p(),
            search_recency_filter: default_recency_filter(),
            system_prompt: default_research_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_push_url")]
    pub url: String,
    #[serde(default = "default_push_timeout")]
    pub timeout_seconds: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_push_url(),
            timeout_seconds: default_push_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Per-model price overrides merged over the built-in table
    #[serde(default)]
    pub models: HashMap<String, ModelPrice>,
}

impl Config {
    /// Built-in pricing table with configured overrides applied
    pub fn pricing_table(&self) -> PricingTable {
        PricingTable::with_overrides(&self.pricing.models)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8003
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_duration() -> u64 {
    600
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_user() -> String {
    "root".to_string()
}

fn default_db_name() -> String {
    "agent_house".to_string()
}

fn default_pool_recycle() -> u64 {
    3600
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_agent_name() -> String {
    "deep_search_agent".to_string()
}

fn default_agent_description() -> String {
    "Runs multi-source deep research on a query and returns a structured report with a cost estimate"
        .to_string()
}

fn default_agent_version() -> String {
    "1.0.0".to_string()
}

fn default_app_name() -> String {
    "default-app".to_string()
}

fn default_max_llm_calls() -> u32 {
    20
}

fn default_pricing_model() -> String {
    DEFAULT_PRICING_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

fn default_perplexity_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}

fn default_perplexity_timeout() -> u64 {
    1800
}

fn default_max_retries() -> u32 {
    3
}

fn default_reasoning_effort() -> String {
    "high".to_string()
}

fn default_max_tokens() -> u32 {
    12000
}

fn default_perplexity_temperature() -> f32 {
    0.3
}

fn default_top_p() -> f32 {
    0.9
}

fn default_recency_filter() -> String {
    "month".to_string()
}

fn default_research_system_prompt() -> String {
    "You are a professional investment analyst. Every analysis must be detailed and \
     comprehensive.\n\nWrite each section at length, at least 200-300 words, and include \
     concrete figures, data, recent news, analyst opinions and market trends so that the \
     whole report runs to at least 3000 words.\n\nFollow the structure and outline the \
     user asks for, covering every part in sufficient depth."
        .to_string()
}

fn default_push_url() -> String {
    "http://localhost:4000/push".to_string()
}

fn default_push_timeout() -> u64 {
    5
}

pub fn snake_to_title(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Flat environment variables kept for deployments that predate the
/// prefixed form; they override every other source
const LEGACY_ENV: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("GLOBAL_CACHE_DURATION", "cache.global_duration_seconds"),
    ("AGENT_CACHE_DURATION", "cache.agent_duration_seconds"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("DB_POOL_RECYCLE_SECONDS", "database.pool_recycle_seconds"),
    ("PERPLEXITY_API_KEY", "perplexity.api_key"),
    ("GOOGLE_API_KEY", "llm.api_key"),
];

/// Load configuration from `path` (optional) and the environment
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("DEEP_RESEARCH")
                .prefix_separator("__")
                .separator("__"),
        );

    build_config(builder, |name| std::env::var(name).ok())
}

/// Apply the legacy overrides, deserialize and validate
pub fn build_config<F>(builder: ConfigBuilder<DefaultState>, lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = builder;
    for (var, key) in LEGACY_ENV {
        let value = lookup(var).filter(|v| !v.trim().is_empty());
        builder = builder.set_override_option(*key, value)?;
    }

    let cfg: Config = builder.build()?.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        anyhow::bail!("Server port must be non-zero");
    }

    if cfg.agent.max_llm_calls == 0 {
        anyhow::bail!("agent.max_llm_calls must be at least 1");
    }

    if cfg.perplexity.max_retries == 0 {
        anyhow::bail!("perplexity.max_retries must be at least 1");
    }

    for (name, seconds) in [
        ("global_duration_seconds", cfg.cache.global_duration_seconds),
        ("agent_duration_seconds", cfg.cache.agent_duration_seconds),
        ("prompt_duration_seconds", cfg.cache.prompt_duration_seconds),
        ("cleanup_interval_seconds", cfg.cache.cleanup_interval_seconds),
    ] {
        if seconds == 0 {
            anyhow::bail!("cache.{} must be at least 1 second", name);
        }
    }

    for (model, price) in &cfg.pricing.models {
        if !price.is_valid() {
            anyhow::bail!(
                "Pricing override for '{}' must have finite, non-negative prices",
                model
            );
        }
    }

    Ok(())
}

/// Problems that do not stop the server but will fail requests
///
/// Kept out of `validate_config` so callers can report them after logging
/// is initialized.
pub fn config_warnings(cfg: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if cfg.perplexity.api_key.is_empty() {
        warnings.push("PERPLEXITY_API_KEY is not set; research tool calls will fail");
    }
    if cfg.llm.api_key.is_empty() {
        warnings.push("GOOGLE_API_KEY is not set; agent runs will fail");
    }
    warnings
}
