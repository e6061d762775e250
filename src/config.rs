//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "chain-watch")]
#[command(about = "Watch a chain timer and sound alarms before it runs out")]
#[command(version)]
pub struct Config {
    /// Port to bind the control API to
    #[arg(short, long, default_value = "20560")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Path of the operator settings document
    #[arg(short, long, default_value = "chainwatch_data/settings.json")]
    pub settings: PathBuf,

    /// Base URL of the chain endpoint
    #[arg(long, default_value = "https://api.torn.com/faction/")]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    pub request_timeout: u64,

    /// Audio player program used for alarms
    #[arg(long, default_value = "paplay")]
    pub player: String,

    /// Start watching immediately instead of waiting for POST /start
    #[arg(long)]
    pub start: bool,

    /// Print the countdown to stdout
    #[arg(long)]
    pub console: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
