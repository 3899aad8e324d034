//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// Redactify - medical document de-identification
#[derive(Parser, Debug)]
#[command(name = "redactify")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "redactify.toml", env = "REDACTIFY_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "REDACTIFY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// De-identify a scanned document by masking detected PHI
    Deidentify(commands::deidentify::DeidentifyArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
