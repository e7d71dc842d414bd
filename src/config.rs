//! Configuration module.
//!
//! Handles loading, validating, and merging `imgshift.toml`. Stock defaults
//! are overridden by the user's file, which is in turn overridden by CLI
//! flags (the binary applies those last).
//!
//! ## Config File Location
//!
//! `imgshift.toml` is read from the working directory, or from the directory
//! passed with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [convert]
//! # format = "webp"          # jpg | png | webp | ico (no default)
//! quality = 90              # JPEG/WEBP quality (1-100)
//! ico_mode = "png-payload"  # png-payload | container
//! policy = "all-or-nothing" # all-or-nothing | partial
//!
//! [output]
//! dir = "converted"         # Where converted files are saved
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [usage]
//! enforce = false           # Refuse batches once the daily quota is spent
//! guest_limit = 5
//! user_limit = 5
//! state_file = ".imgshift-usage.json"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [convert]
//! format = "jpg"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::convert::BatchPolicy;
use crate::imaging::{ConversionRequest, IcoMode, Quality, TargetFormat};
use crate::usage::UsageLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the config directory.
pub const CONFIG_FILE_NAME: &str = "imgshift.toml";

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
}

/// Application configuration loaded from `imgshift.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Output format and encoder settings.
    pub convert: ConvertConfig,
    /// Where converted files land.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Daily usage counter.
    pub usage: UsageConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(Quality::MIN..=Quality::MAX).contains(&self.convert.quality) {
            return Err(ConfigError::Validation(format!(
                "convert.quality must be {}-{}",
                Quality::MIN,
                Quality::MAX
            )));
        }
        if self.output.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output.dir must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.usage.state_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "usage.state_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Conversion request for `format` with the configured encoder settings.
    pub fn request_for(&self, format: TargetFormat) -> ConversionRequest {
        ConversionRequest::new(format, Quality::new(self.convert.quality))
            .with_ico_mode(self.convert.ico_mode)
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Target format used when `--to` is not given. None means "ask".
    pub format: Option<TargetFormat>,
    /// JPEG/WEBP quality, 1-100. Ignored by PNG and ICO.
    pub quality: u32,
    pub ico_mode: IcoMode,
    pub policy: BatchPolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            format: None,
            quality: Quality::default().value(),
            ico_mode: IcoMode::default(),
            policy: BatchPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("converted"),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent, defaults to the number of CPU cores.
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
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Daily usage counter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsageConfig {
    pub enforce: bool,
    pub guest_limit: u32,
    pub user_limit: u32,
    /// JSON file holding the per-day counters. Relative paths resolve
    /// against the config directory.
    pub state_file: PathBuf,
}

impl Default for UsageConfig {
    fn default() -> Self {
        let limits = UsageLimits::default();
        Self {
            enforce: false,
            guest_limit: limits.guest,
            user_limit: limits.user,
            state_file: PathBuf::from(".imgshift-usage.json"),
        }
    }
}

impl UsageConfig {
    pub fn limits(&self) -> UsageLimits {
        UsageLimits {
            guest: self.guest_limit,
            user: self.user_limit,
        }
    }

    /// State file location, anchored at `config_dir` when relative.
    pub fn state_path(&self, config_dir: &Path) -> PathBuf {
        if self.state_file.is_absolute() {
            self.state_file.clone()
        } else {
            config_dir.join(&self.state_file)
        }
    }
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Serialize stock defaults into a TOML value tree.
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

/// Load `imgshift.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `imgshift.toml`.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
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

/// Load config from `imgshift.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imgshift.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgshift Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Conversion
# ---------------------------------------------------------------------------
[convert]
# Output format used when --to is not given: "jpg", "png", "webp" or "ico".
# Leave unset to require --to on every run.
# format = "webp"

# Encoding quality for JPEG and WEBP (1 = worst, 100 = best).
# PNG and ICO output ignores it.
quality = 90

# ICO output is always a 256x256 canvas.
# "png-payload" writes PNG bytes under the .ico name (what browsers produce).
# "container" wraps the image in a real ICO directory.
ico_mode = "png-payload"

# What a batch does when some images fail to convert.
# "all-or-nothing" saves nothing and reports one error.
# "partial" saves the images that converted and lists the failures.
policy = "all-or-nothing"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Directory converted files are saved into. Existing files are never
# overwritten; clashes get " (1)", " (2)", ... before the extension.
dir = "converted"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4

# ---------------------------------------------------------------------------
# Daily usage counter
# ---------------------------------------------------------------------------
[usage]
# Refuse to start a batch once today's quota is used up.
enforce = false

# Batches per day for guests and signed-in users.
guest_limit = 5
user_limit = 5

# JSON file holding the counters, relative to the config directory.
state_file = ".imgshift-usage.json"
"##
}
