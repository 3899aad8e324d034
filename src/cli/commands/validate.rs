//! `redactify validate-config` command

use crate::config::load_config;
use anyhow::Context;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = load_config(config_path)
            .await
            .context("configuration is invalid")?;

        println!("Configuration OK ({config_path})");
        println!("  masking level:      {}", config.redaction.masking_level);
        println!(
            "  confidence cutoff:  {:.2}",
            config.redaction.confidence_threshold
        );
        println!(
            "  azure providers:    {}",
            if config.azure.is_configured() {
                "configured"
            } else {
                "not configured (offline mode only)"
            }
        );
        Ok(0)
    }
}
