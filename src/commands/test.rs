use anyhow::Result;
use colored::Colorize;
use deep_research_agent::config;
use std::path::Path;
use tracing::info;

/// Execute the test command
///
/// This validates the configuration file without starting the server
pub fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Testing configuration...".yellow());
    info!("Loading and validating configuration");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration test successful".green());
    println!();

    let enabled = |on: bool| if on { "enabled".green() } else { "disabled".red() };

    println!("{}", "Configuration Summary:".bold());
    println!("  {}: {}:{}", "Server".cyan(), cfg.server.host, cfg.server.port);
    println!("  {}: {}", "Log Level".cyan(), cfg.server.log_level);
    println!(
        "  {}: {} (app {})",
        "Agent".cyan(),
        cfg.agent.name,
        cfg.agent.app_name
    );
    println!("  {}: {}", "LLM".cyan(), cfg.llm.model);
    println!(
        "  {}: {} ({} attempts)",
        "Research Model".cyan(),
        cfg.perplexity.model,
        cfg.perplexity.max_retries
    );
    println!(
        "  {}: global {}s, agent {}s, policy {:?}",
        "Cache".cyan(),
        cfg.cache.global_duration_seconds,
        cfg.cache.agent_duration_seconds,
        cfg.cache.expiry_policy
    );
    println!(
        "  {}: {} ({}:{}/{})",
        "Database".cyan(),
        enabled(cfg.database.enabled),
        cfg.database.host,
        cfg.database.port,
        cfg.database.name
    );
    println!("  {}: {}", "Push".cyan(), enabled(cfg.push.enabled));

    let pricing = cfg.pricing_table();
    println!(
        "  {}: {} ({} models, {} overrides)",
        "Pricing".cyan(),
        pricing.version(),
        pricing.models().len(),
        cfg.pricing.models.len()
    );

    let warnings = config::config_warnings(&cfg);
    if !warnings.is_empty() {
        println!();
        for warning in warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    info!("Configuration validation completed successfully");
    Ok(())
}
