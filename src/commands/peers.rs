use anyhow::Result;
use colored::Colorize;
use deep_research_agent::{
    config,
    db::{create_pool, AgentDirectory, MySqlDirectory},
};
use std::path::Path;

/// Execute the peers command
///
/// Lists the active, non-orchestrator agents of a service
pub async fn execute(config_path: &Path, service_id: i64) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    if !cfg.database.enabled {
        anyhow::bail!("The agent registry database is disabled in the configuration");
    }

    let directory = MySqlDirectory::new(create_pool(&cfg.database));
    let urls = directory.agent_urls(service_id).await?;

    if urls.is_empty() {
        println!("{}", format!("No peer agents for service {}", service_id).yellow());
        return Ok(());
    }

    println!("{}", format!("Peer agents for service {}:", service_id).green().bold());
    for url in urls {
        println!("  {:>5}  {}", url.agent_id, url.base_url);
    }
    Ok(())
}
