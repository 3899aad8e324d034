//! `redactify deidentify` command

use crate::config::load_config;
use crate::domain::RedactifyError;
use crate::pipeline::Deidentifier;
use crate::providers::{
    AzureOcrProvider, AzurePhiProvider, MockOcrProvider, OcrProvider, PatternPhiProvider,
    PhiProvider,
};
use anyhow::Context;
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Which OCR / PHI backends to use
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Azure Document Intelligence + Azure Language
    Azure,
    /// Built-in mock OCR and pattern PHI detection; no network access
    Offline,
}

/// Arguments for the deidentify command
#[derive(Args, Debug)]
pub struct DeidentifyArgs {
    /// Input document path (.tiff or .png)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output path; defaults to `<input>.redacted.<ext>`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Masking level override (safe_harbor, limited_dataset, custom)
    #[arg(short, long)]
    pub level: Option<String>,

    /// Provider backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Azure)]
    pub provider: ProviderKind,
}

impl DeidentifyArgs {
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let mut config = load_config(config_path)
            .await
            .context("failed to load configuration")?;

        if let Some(level) = &self.level {
            config.redaction.masking_level = level.parse().map_err(anyhow::Error::msg)?;
        }

        let custom_categories = config.redaction.custom_categories.clone();
        let (ocr, phi): (Arc<dyn OcrProvider>, Arc<dyn PhiProvider>) = match self.provider {
            ProviderKind::Azure => {
                anyhow::ensure!(
                    config.azure.is_configured(),
                    "Azure endpoints and keys are not configured; \
                     set REDACTIFY_AZURE_* variables or pass --provider offline"
                );
                (
                    Arc::new(AzureOcrProvider::new(&config.azure)?),
                    Arc::new(
                        AzurePhiProvider::new(&config.azure)?
                            .with_custom_categories(custom_categories),
                    ),
                )
            }
            ProviderKind::Offline => (
                Arc::new(MockOcrProvider::new()),
                Arc::new(PatternPhiProvider::new().with_custom_categories(custom_categories)),
            ),
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input));

        let deidentifier = Deidentifier::new(ocr, phi, config.redaction)?;
        let result = match deidentifier
            .deidentify_file(&self.input, Some(output.as_path()), shutdown)
            .await
        {
            Ok(result) => result,
            Err(RedactifyError::Cancelled) => {
                println!("Cancelled before completion; no output written.");
                return Ok(4);
            }
            Err(e) => return Err(e.into()),
        };

        if result.is_success() {
            println!("De-identification complete: {}", output.display());
            println!("  pages processed:   {}", result.pages_processed);
            println!("  entities detected: {}", result.entities_detected);
            println!("  regions painted:   {}", result.regions_produced);
            if result.entities_filtered > 0 {
                println!("  entities filtered: {}", result.entities_filtered);
            }
            if result.entities_unmatched > 0 {
                println!(
                    "  WARNING: {} entities could not be located and are NOT masked",
                    result.entities_unmatched
                );
            }
            println!("  elapsed:           {} ms", result.processing_time_ms);
            Ok(0)
        } else {
            eprintln!("De-identification failed:");
            for error in &result.errors {
                eprintln!("  - {error}");
            }
            Ok(1)
        }
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = input.extension().and_then(|s| s.to_str()).unwrap_or("tiff");
    input.with_file_name(format!("{stem}.redacted.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/data/scan.tiff"));
        assert_eq!(path, PathBuf::from("/data/scan.redacted.tiff"));
    }
}
