use anyhow::Result;
use colored::Colorize;
use deep_research_agent::{config, server};
use std::path::Path;
use tracing::{info, warn};

/// Execute the start command
///
/// This will:
/// 1. Load and validate configuration
/// 2. Report missing credentials
/// 3. Start the server (blocks until shutdown)
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting deep research agent...".green());

    let cfg = config::load_config(config_path)?;
    info!("Configuration loaded from {}", config_path.display());
    for warning in config::config_warnings(&cfg) {
        warn!("{}", warning);
    }

    server::start_server(cfg).await
}
