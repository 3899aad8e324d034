//! Configuration management
//!
//! Configuration is loaded from a TOML file (`redactify.toml` by default),
//! then environment variables override individual keys so secrets never have
//! to live on disk. Everything is validated before the pipeline starts.

use crate::domain::{MaskingLevel, RedactifyError, Result};
use crate::matching::MatcherConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RedactifyConfig {
    #[serde(default)]
    pub redaction: RedactionConfig,

    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RedactifyConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.redaction.validate()?;
        self.azure.validate()?;
        Ok(())
    }

    /// Apply `REDACTIFY_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.redaction.apply_env_overrides()?;
        self.azure.apply_env_overrides();
        Ok(())
    }
}

/// Knobs of the de-identification core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// HIPAA compliance level forwarded to the PHI provider
    #[serde(default)]
    pub masking_level: MaskingLevel,

    /// Categories masked when `masking_level` is `custom`
    #[serde(default)]
    pub custom_categories: HashSet<String>,

    /// Entities below this confidence are dropped
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Padding in pixels added around each mask rectangle
    #[serde(default = "default_padding_px")]
    pub padding_px: u32,

    /// Max edit distance when aligning OCR words to the full text
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_word_threshold: usize,

    /// Max edit distance when locating entities
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_entity_threshold: usize,

    /// Minimum similarity ratio guarding fuzzy entity fallback
    #[serde(default = "default_min_similarity_ratio")]
    pub min_similarity_ratio: f64,

    /// Size threshold before the OCR upload is flagged for optimization
    #[serde(default = "default_max_ocr_size_mb")]
    pub max_ocr_size_mb: f64,

    /// RGB mask fill color
    #[serde(default)]
    pub mask_color: [u8; 3],

    /// Render inspectable semi-transparent masks; never for production
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_confidence_threshold() -> f64 {
    0.80
}

fn default_padding_px() -> u32 {
    5
}

fn default_fuzzy_threshold() -> usize {
    2
}

fn default_min_similarity_ratio() -> f64 {
    0.6
}

fn default_max_ocr_size_mb() -> f64 {
    10.0
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            masking_level: MaskingLevel::default(),
            custom_categories: HashSet::new(),
            confidence_threshold: default_confidence_threshold(),
            padding_px: default_padding_px(),
            fuzzy_word_threshold: default_fuzzy_threshold(),
            fuzzy_entity_threshold: default_fuzzy_threshold(),
            min_similarity_ratio: default_min_similarity_ratio(),
            max_ocr_size_mb: default_max_ocr_size_mb(),
            mask_color: [0, 0, 0],
            debug_mode: false,
        }
    }
}

impl RedactionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(RedactifyError::Configuration(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_similarity_ratio) {
            return Err(RedactifyError::Configuration(format!(
                "min_similarity_ratio must be within [0, 1], got {}",
                self.min_similarity_ratio
            )));
        }
        if self.max_ocr_size_mb <= 0.0 {
            return Err(RedactifyError::Configuration(
                "max_ocr_size_mb must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Matcher view of this configuration
    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            confidence_threshold: self.confidence_threshold,
            padding_px: f64::from(self.padding_px),
            fuzzy_entity_threshold: self.fuzzy_entity_threshold,
            min_similarity_ratio: self.min_similarity_ratio,
            merge_adjacent: true,
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = env::var("REDACTIFY_MASKING_LEVEL") {
            self.masking_level = value
                .parse()
                .map_err(RedactifyError::Configuration)?;
        }
        if let Ok(value) = env::var("REDACTIFY_CUSTOM_CATEGORIES") {
            self.custom_categories = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(value) = env::var("REDACTIFY_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = value.parse().map_err(|_| {
                RedactifyError::Configuration(format!(
                    "invalid REDACTIFY_CONFIDENCE_THRESHOLD value '{value}'"
                ))
            })?;
        }
        if let Ok(value) = env::var("REDACTIFY_PADDING_PX") {
            self.padding_px = value.parse().map_err(|_| {
                RedactifyError::Configuration(format!(
                    "invalid REDACTIFY_PADDING_PX value '{value}'"
                ))
            })?;
        }
        if let Ok(value) = env::var("REDACTIFY_DEBUG_MODE") {
            self.debug_mode = value.parse().map_err(|_| {
                RedactifyError::Configuration(format!(
                    "invalid REDACTIFY_DEBUG_MODE value '{value}'"
                ))
            })?;
        }
        Ok(())
    }
}

/// Azure service endpoints and credentials
///
/// Keys are normally supplied through the environment, not the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub document_intelligence_endpoint: String,

    #[serde(default, skip_serializing)]
    pub document_intelligence_key: String,

    #[serde(default)]
    pub language_endpoint: String,

    #[serde(default, skip_serializing)]
    pub language_key: String,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            document_intelligence_endpoint: String::new(),
            document_intelligence_key: String::new(),
            language_endpoint: String::new(),
            language_key: String::new(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AzureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(RedactifyError::Configuration(
                "timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether both Azure services are configured
    pub fn is_configured(&self) -> bool {
        !self.document_intelligence_endpoint.is_empty()
            && !self.document_intelligence_key.is_empty()
            && !self.language_endpoint.is_empty()
            && !self.language_key.is_empty()
    }

    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            ("REDACTIFY_AZURE_DI_ENDPOINT", &mut self.document_intelligence_endpoint),
            ("REDACTIFY_AZURE_DI_KEY", &mut self.document_intelligence_key),
            ("REDACTIFY_AZURE_LANGUAGE_ENDPOINT", &mut self.language_endpoint),
            ("REDACTIFY_AZURE_LANGUAGE_KEY", &mut self.language_key),
        ];
        for (key, slot) in overrides {
            if let Ok(value) = env::var(key) {
                *slot = value;
            }
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write rotated JSON log files
    #[serde(default)]
    pub file_enabled: bool,

    #[serde(default = "default_log_path")]
    pub file_path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_path() -> String {
    "./logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            file_path: default_log_path(),
        }
    }
}

/// Load configuration from a TOML file, then apply environment overrides and
/// validate
///
/// A missing file is not an error: defaults plus environment variables are
/// used instead, which is the common container deployment shape.
pub async fn load_config(path: impl AsRef<Path>) -> Result<RedactifyConfig> {
    let path = path.as_ref();

    let mut config = if path.exists() {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            RedactifyError::Configuration(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        toml::from_str(&contents)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        RedactifyConfig::default()
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Template written by `redactify init`
pub fn default_config_template() -> &'static str {
    r#"# Redactify configuration

[redaction]
# safe_harbor, limited_dataset or custom
masking_level = "safe_harbor"
# Categories masked in custom mode, e.g. ["Person", "SSN"]
custom_categories = []
confidence_threshold = 0.80
padding_px = 5
fuzzy_word_threshold = 2
fuzzy_entity_threshold = 2
min_similarity_ratio = 0.6
max_ocr_size_mb = 10.0
mask_color = [0, 0, 0]
debug_mode = false

[azure]
# Endpoints may live here; keys belong in the environment:
#   REDACTIFY_AZURE_DI_KEY, REDACTIFY_AZURE_LANGUAGE_KEY
document_intelligence_endpoint = ""
language_endpoint = ""
timeout_seconds = 120
max_retries = 3
poll_interval_ms = 1000

[logging]
level = "info"
file_enabled = false
file_path = "./logs"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RedactionConfig::default();
        assert_eq!(config.masking_level, MaskingLevel::SafeHarbor);
        assert!(config.custom_categories.is_empty());
        assert_eq!(config.confidence_threshold, 0.80);
        assert_eq!(config.padding_px, 5);
        assert_eq!(config.fuzzy_word_threshold, 2);
        assert_eq!(config.fuzzy_entity_threshold, 2);
        assert_eq!(config.min_similarity_ratio, 0.6);
        assert_eq!(config.max_ocr_size_mb, 10.0);
        assert_eq!(config.mask_color, [0, 0, 0]);
        assert!(!config.debug_mode);
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config: RedactifyConfig = toml::from_str(default_config_template()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.redaction.confidence_threshold, 0.80);
        assert_eq!(config.azure.timeout_seconds, 120);
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let config = RedactionConfig {
            confidence_threshold: 1.5,
            ..RedactionConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RedactionConfig {
            max_ocr_size_mb: 0.0,
            ..RedactionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RedactifyConfig =
            toml::from_str("[redaction]\nconfidence_threshold = 0.5\n").unwrap();
        assert_eq!(config.redaction.confidence_threshold, 0.5);
        assert_eq!(config.redaction.padding_px, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_matcher_config_conversion() {
        let config = RedactionConfig::default();
        let matcher = config.matcher_config();
        assert_eq!(matcher.confidence_threshold, 0.80);
        assert_eq!(matcher.padding_px, 5.0);
        assert!(matcher.merge_adjacent);
    }
}
