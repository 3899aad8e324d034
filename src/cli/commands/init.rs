//! `redactify init` command

use crate::config::default_config_template;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration file
    #[arg(default_value = "redactify.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub async fn execute(&self) -> anyhow::Result<i32> {
        if self.path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite",
                self.path.display()
            );
        }

        tokio::fs::write(&self.path, default_config_template()).await?;
        println!("Wrote {}", self.path.display());
        println!("Set REDACTIFY_AZURE_DI_KEY and REDACTIFY_AZURE_LANGUAGE_KEY in the environment.");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redactify.toml");

        let args = InitArgs {
            path: path.clone(),
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 0);
        assert!(args.execute().await.is_err());

        let forced = InitArgs { path, force: true };
        assert_eq!(forced.execute().await.unwrap(), 0);
    }
}
