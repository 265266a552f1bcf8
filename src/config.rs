//! Application configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a `config.toml` in the config directory (`--config-dir`,
//! default `.`) overrides any subset of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [expansion]
//! default_ratio = "1:1"       # Target aspect ratio when --ratio is not given
//! max_dimension = 5000        # Max width/height of uploads and expanded canvases
//!
//! [intake]
//! max_file_size_mb = 15       # Larger uploads are rejected
//!
//! [batch]
//! request_delay_ms = 1000     # Pause between consecutive model requests
//!
//! [service]
//! endpoint = "https://generativelanguage.googleapis.com"
//! model = "gemini-2.5-flash-image"
//! api_key_env = "GEMINI_API_KEY"  # Environment variable holding the API key
//! # timeout_secs = 120        # Per-request timeout (default: none)
//!
//! [export]
//! format = "png"              # jpg | png | webp
//! quality = 95                # JPEG quality (1-100)
//! suffix = "-expanded"        # Appended to every exported file stem
//! archive_name = "expanded-images.zip"
//!
//! [processing]
//! max_processes = 4           # Max parallel export workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want:
//!
//! ```toml
//! [expansion]
//! default_ratio = "16:9"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::batch::BatchSettings;
use crate::export::{DEFAULT_ARCHIVE_NAME, ExportSettings};
use crate::imaging::{MAX_DIMENSION, Quality};
use crate::intake::{IntakeLimits, MAX_FILE_SIZE_MB};
use crate::naming::DEFAULT_SUFFIX;
use crate::service::gemini::{DEFAULT_MODEL, GEMINI_API_BASE};
use crate::service::{EXPANSION_PROMPT, GeminiConfig};
use crate::types::{AspectRatio, DEFAULT_ASPECT_RATIO, OutputFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),
}

/// Application configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Target ratio and canvas limits.
    pub expansion: ExpansionConfig,
    /// Upload validation limits.
    pub intake: IntakeConfig,
    /// Batch pacing.
    pub batch: BatchConfig,
    /// Generative image service connection.
    pub service: ServiceConfig,
    /// Download format and naming.
    pub export: ExportConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if AspectRatio::parse(&self.expansion.default_ratio).is_none() {
            return Err(ConfigError::Validation(format!(
                "expansion.default_ratio \"{}\" must be W:H with positive numbers",
                self.expansion.default_ratio
            )));
        }
        if self.expansion.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "expansion.max_dimension must be non-zero".into(),
            ));
        }
        if self.intake.max_file_size_mb == 0 {
            return Err(ConfigError::Validation(
                "intake.max_file_size_mb must be non-zero".into(),
            ));
        }
        if self.export.quality == 0 || self.export.quality > 100 {
            return Err(ConfigError::Validation("export.quality must be 1-100".into()));
        }
        if self.export.archive_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "export.archive_name must not be empty".into(),
            ));
        }
        if self.service.model.trim().is_empty() {
            return Err(ConfigError::Validation("service.model must not be empty".into()));
        }
        if self.service.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "service.api_key_env must not be empty".into(),
            ));
        }
        if self.service.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "service.timeout_secs must be non-zero when set".into(),
            ));
        }
        Ok(())
    }

    pub fn intake_limits(&self) -> IntakeLimits {
        IntakeLimits {
            max_file_bytes: self.intake.max_file_size_mb.saturating_mul(1024 * 1024),
            max_dimension: self.expansion.max_dimension,
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            request_delay: Duration::from_millis(self.batch.request_delay_ms),
            max_dimension: self.expansion.max_dimension,
            prompt: EXPANSION_PROMPT.to_string(),
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            quality: Quality::new(self.export.quality),
            suffix: self.export.suffix.clone(),
            archive_name: self.export.archive_name.clone(),
        }
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let name = self.service.api_key_env.trim();
        std::env::var(name)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(name.to_string()))
    }

    pub fn gemini_config(&self, api_key: String) -> GeminiConfig {
        GeminiConfig {
            api_key,
            model: self.service.model.clone(),
            endpoint: self.service.endpoint.clone(),
            timeout: self.service.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpansionConfig {
    /// Ratio used when the CLI does not pass `--ratio`.
    pub default_ratio: String,
    /// Ceiling for either side of an upload or an expanded canvas.
    pub max_dimension: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            default_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            max_dimension: MAX_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    pub max_file_size_mb: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: MAX_FILE_SIZE_MB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Milliseconds to wait between consecutive requests in one run.
    pub request_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    /// Per-request timeout. No timeout when absent.
    pub timeout_secs: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub format: OutputFormat,
    /// JPEG quality (1-100). PNG and WebP are lossless.
    pub quality: u32,
    pub suffix: String,
    pub archive_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: 95,
            suffix: DEFAULT_SUFFIX.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel export workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# batch-expand Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the directory passed with --config-dir
# (default: the current directory). Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Canvas expansion
# ---------------------------------------------------------------------------
[expansion]
# Target aspect ratio when --ratio is not given. Any W:H of positive numbers.
# Presets: 1:1, 2:3, 3:2, 3:4, 4:3, 4:5, 5:4, 9:16, 16:9
default_ratio = "1:1"

# Largest allowed width or height, in pixels, for uploads and for the
# expanded canvas.
max_dimension = 5000

# ---------------------------------------------------------------------------
# Upload validation
# ---------------------------------------------------------------------------
[intake]
# Files larger than this are rejected before decoding.
max_file_size_mb = 15

# ---------------------------------------------------------------------------
# Batch pacing
# ---------------------------------------------------------------------------
[batch]
# Pause between consecutive model requests, to stay under rate limits.
request_delay_ms = 1000

# ---------------------------------------------------------------------------
# Image model service
# ---------------------------------------------------------------------------
[service]
endpoint = "https://generativelanguage.googleapis.com"
model = "gemini-2.5-flash-image"

# Environment variable the API key is read from.
api_key_env = "GEMINI_API_KEY"

# Per-request timeout in seconds. Omit for no timeout.
# timeout_secs = 120

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# Download format for every image: jpg, png or webp.
format = "png"

# JPEG quality (1 = worst, 100 = best). PNG and WebP are lossless.
quality = 95

# Appended to each file stem: dawn.jpg -> dawn-expanded.png
suffix = "-expanded"

# File name of the zip archive.
archive_name = "expanded-images.zip"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for export re-encoding.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.expansion.default_ratio, "1:1");
        assert_eq!(config.expansion.max_dimension, 5000);
        assert_eq!(config.intake.max_file_size_mb, 15);
        assert_eq!(config.batch.request_delay_ms, 1000);
        assert_eq!(config.service.model, "gemini-2.5-flash-image");
        assert_eq!(config.service.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.service.timeout_secs, None);
        assert_eq!(config.export.format, OutputFormat::Png);
        assert_eq!(config.export.quality, 95);
        assert_eq!(config.export.suffix, "-expanded");
        assert_eq!(config.export.archive_name, "expanded-images.zip");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[expansion]
default_ratio = "16:9"

[export]
format = "webp"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.expansion.default_ratio, "16:9");
        assert_eq!(config.export.format, OutputFormat::Webp);
        // Defaults preserved
        assert_eq!(config.expansion.max_dimension, 5000);
        assert_eq!(config.export.quality, 95);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
[expansion]
default_ration = "16:9"
"#;
        assert!(toml::from_str::<AppConfig>(toml).is_err());
    }

    #[test]
    fn derived_settings_follow_config() {
        let mut config = AppConfig::default();
        config.intake.max_file_size_mb = 2;
        config.expansion.max_dimension = 800;
        config.batch.request_delay_ms = 250;
        config.export.quality = 150;

        assert_eq!(
            config.intake_limits(),
            IntakeLimits {
                max_file_bytes: 2 * 1024 * 1024,
                max_dimension: 800
            }
        );
        let batch = config.batch_settings();
        assert_eq!(batch.request_delay, Duration::from_millis(250));
        assert_eq!(batch.max_dimension, 800);
        assert_eq!(config.export_settings().quality, Quality(100));
    }

    #[test]
    fn huge_file_size_limit_saturates() {
        let mut config = AppConfig::default();
        config.intake.max_file_size_mb = u64::MAX / 2;
        assert_eq!(config.intake_limits().max_file_bytes, u64::MAX);
    }

    #[test]
    fn gemini_config_maps_service_section() {
        let mut config = AppConfig::default();
        config.service.timeout_secs = Some(30);
        config.service.endpoint = "http://localhost:8080".into();

        let gemini = config.gemini_config("secret".into());
        assert_eq!(gemini.api_key, "secret");
        assert_eq!(gemini.endpoint, "http://localhost:8080");
        assert_eq!(gemini.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        let mut config = AppConfig::default();
        config.service.api_key_env = "BATCH_EXPAND_TEST_UNSET_VARIABLE".into();
        let err = config.api_key().unwrap_err();
        assert_eq!(
            err.to_string(),
            "API key not found: set the BATCH_EXPAND_TEST_UNSET_VARIABLE environment variable"
        );
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_bad_ratio() {
        let mut config = AppConfig::default();
        config.expansion.default_ratio = "wide".into();
        assert!(config.validate().is_err());
        config.expansion.default_ratio = "4:3:2".into();
        assert!(config.validate().is_err());
        config.expansion.default_ratio = "2.39:1".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.export.quality = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.intake.max_file_size_mb = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.service.timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.export.archive_name = " ".into();
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge / load
    // =========================================================================

    #[test]
    fn merge_overrides_only_given_keys() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[batch]\nrequest_delay_ms = 0").unwrap();
        let config: AppConfig = merge_toml(base, overlay).try_into().unwrap();
        assert_eq!(config.batch.request_delay_ms, 0);
        assert_eq!(config.intake.max_file_size_mb, 15);
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.expansion.default_ratio, "1:1");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[service]
model = "gemini-custom"
timeout_secs = 90

[processing]
max_processes = 2
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.service.model, "gemini-custom");
        assert_eq!(config.service.timeout_secs, Some(90));
        assert_eq!(config.processing.max_processes, Some(2));
        assert_eq!(config.service.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn load_config_validates() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            "[export]\nquality = 101\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_config_reports_bad_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[expansion\n").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.expansion.default_ratio, defaults.expansion.default_ratio);
        assert_eq!(config.batch.request_delay_ms, defaults.batch.request_delay_ms);
        assert_eq!(config.export.archive_name, defaults.export.archive_name);
        assert_eq!(config.service.endpoint, defaults.service.endpoint);
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(10_000)
            }),
            cores
        );
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_processes: Some(1)
            }),
            1
        );
    }
}
