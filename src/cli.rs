use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deep-research-agent", version, about = "Deep research agent")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the agent server (default)
    Start,

    /// Test configuration file validity
    Test,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Price a usage object and print the breakdown
    Cost {
        /// Pricing model (unknown models use the default price list)
        #[arg(short, long, default_value = "sonar-deep-research")]
        model: String,

        /// Usage JSON, e.g. '{"prompt_tokens": 1000, "num_search_queries": 12}'
        usage: String,
    },

    /// List the peer agents registered for a service
    Peers {
        /// Service id in the agent registry
        service_id: i64,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration (with secrets masked)
    Show,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}
