use anyhow::Result;
use colored::Colorize;
use deep_research_agent::config::{self, Config};
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Sanitize secrets in configuration for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    sanitized.llm.api_key = mask_api_key(&sanitized.llm.api_key);
    sanitized.perplexity.api_key = mask_api_key(&sanitized.perplexity.api_key);
    sanitized.database.password = mask_api_key(&sanitized.database.password);
    sanitized
}

/// Mask a secret for safe display
///
/// Shows first 7 and last 4 characters with asterisks in between
/// Example: "pplx-1234567890abcdef" -> "pplx-12...cdef"
fn mask_api_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 11 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..7].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
