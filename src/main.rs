use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use deep_research_agent::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Log level comes from the config file when it loads; commands report
    // load errors themselves
    let log_level = config::load_config(&args.config)
        .map(|cfg| cfg.server.log_level)
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&log_level);

    match args.get_command() {
        cli::Commands::Start => commands::start::execute(&args.config).await?,
        cli::Commands::Test => commands::test::execute(&args.config)?,
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
        },
        cli::Commands::Cost { model, usage } => {
            commands::cost::execute(&args.config, &model, &usage)?
        }
        cli::Commands::Peers { service_id } => {
            commands::peers::execute(&args.config, service_id).await?
        }
        cli::Commands::Version => {
            println!("Deep Research Agent v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Pricing table {}",
                deep_research_agent::pricing::PRICING_VERSION
            );
        }
    }

    Ok(())
}
