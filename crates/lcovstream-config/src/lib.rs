//! Configuration parsing and management for lcovstream.
//!
//! This crate provides:
//! - Configuration types (`Config`, `EofMode`, `EffectiveConfig`)
//! - TOML parsing and validation of field-name overrides
//! - Discovery of `lcovstream.toml` in the current directory or its parents
//! - Precedence handling (CLI > config file > defaults)

use lcovstream_types::{FieldNames, Variant};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = "lcovstream.toml";

/// Default number of bytes read from a stream per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

// ============================================================================
// Configuration Types
// ============================================================================

/// What to do with bytes left over when the input ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EofMode {
    /// Leftover non-whitespace is an error.
    #[default]
    Strict,
    /// Leftover bytes are ignored and an unsealed final section is kept.
    Lenient,
}

/// Raw configuration as read from `lcovstream.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Bytes per read from a stream source.
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Pretty-print JSON output.
    #[serde(default)]
    pub pretty: Option<bool>,

    /// End-of-input handling.
    #[serde(default)]
    pub eof: Option<EofMode>,

    /// Token overrides keyed by logical field key (e.g. `lineHit`).
    #[serde(default)]
    pub field_names: BTreeMap<String, String>,
}

// ============================================================================
// Effective Configuration
// ============================================================================

/// Effective configuration with all values resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub chunk_size: usize,
    pub pretty: bool,
    pub eof: EofMode,
    pub field_names: FieldNames,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pretty: false,
            eof: EofMode::Strict,
            field_names: FieldNames::default(),
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.chunk_size == Some(0) {
        return Err(ConfigError::InvalidValue(
            "chunk_size must be greater than 0".to_string(),
        ));
    }

    let mut names = FieldNames::default();
    apply_field_names(&mut names, &config.field_names)?;
    validate_field_names(&names)
}

/// Apply `[field_names]` overrides keyed by logical key.
pub fn apply_field_names(
    names: &mut FieldNames,
    overrides: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (key, token) in overrides {
        let variant = Variant::from_key(key)
            .ok_or_else(|| ConfigError::InvalidValue(format!("unknown field name key `{key}`")))?;
        names.set_token(variant, token.as_str());
    }
    Ok(())
}

/// Check that every token is non-empty and distinct from every other token.
pub fn validate_field_names(names: &FieldNames) -> Result<(), ConfigError> {
    if let Some((variant, _)) = names.entries().find(|(_, token)| token.is_empty()) {
        return Err(ConfigError::InvalidValue(format!(
            "field name `{}` must not be empty",
            variant.key()
        )));
    }

    if let Some((first, second)) = names.find_duplicate() {
        return Err(ConfigError::InvalidValue(format!(
            "field names `{}` and `{}` share the token {:?}",
            first.key(),
            second.key(),
            names.token(first).unwrap_or_default()
        )));
    }

    Ok(())
}

/// Try to find and load configuration from the standard location.
///
/// Searches for `lcovstream.toml` in the current directory and parent directories.
pub fn discover_config() -> Result<Option<(PathBuf, Config)>, ConfigError> {
    let Ok(current) = std::env::current_dir() else {
        return Ok(None);
    };
    discover_config_from(&current)
}

/// Search `start` and its ancestors for `lcovstream.toml`.
///
/// The nearest file wins. A file that fails to load is an error; the search
/// does not continue past it.
pub fn discover_config_from(start: &Path) -> Result<Option<(PathBuf, Config)>, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            let config = load_config(&config_path)?;
            return Ok(Some((config_path, config)));
        }

        if !current.pop() {
            return Ok(None);
        }
    }
}

// ============================================================================
// Precedence Resolution
// ============================================================================

/// CLI override options.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub chunk_size: Option<usize>,
    pub pretty: Option<bool>,
    pub eof: Option<EofMode>,
    /// `--field key=TOKEN` pairs, applied in order.
    pub fields: Vec<(Variant, String)>,
}

/// Parse one `key=TOKEN` field override.
///
/// # Examples
///
/// ```
/// use lcovstream_config::parse_field_override;
/// use lcovstream_types::Variant;
///
/// let (variant, token) = parse_field_override("lineHit=LINES_HIT").unwrap();
/// assert_eq!(variant, Variant::LineHit);
/// assert_eq!(token, "LINES_HIT");
///
/// assert!(parse_field_override("lineHit").is_err());
/// ```
pub fn parse_field_override(raw: &str) -> Result<(Variant, String), ConfigError> {
    let Some((key, token)) = raw.split_once('=') else {
        return Err(ConfigError::InvalidValue(format!(
            "field override `{raw}` must look like key=TOKEN"
        )));
    };

    let key = key.trim();
    let variant = Variant::from_key(key)
        .ok_or_else(|| ConfigError::InvalidValue(format!("unknown field name key `{key}`")))?;
    Ok((variant, token.to_string()))
}

/// Resolve effective configuration from config file and CLI overrides.
///
/// Precedence: CLI > config file > defaults. The merged field table is
/// validated, so a CLI override can still be rejected.
pub fn resolve_config(
    config: Option<&Config>,
    cli: &CliOverrides,
) -> Result<EffectiveConfig, ConfigError> {
    let mut effective = EffectiveConfig::default();

    // Apply config file values
    if let Some(config) = config {
        if let Some(chunk_size) = config.chunk_size {
            effective.chunk_size = chunk_size;
        }
        if let Some(pretty) = config.pretty {
            effective.pretty = pretty;
        }
        if let Some(eof) = config.eof {
            effective.eof = eof;
        }
        apply_field_names(&mut effective.field_names, &config.field_names)?;
    }

    // Apply CLI overrides
    if let Some(chunk_size) = cli.chunk_size {
        effective.chunk_size = chunk_size;
    }
    if let Some(pretty) = cli.pretty {
        effective.pretty = pretty;
    }
    if let Some(eof) = cli.eof {
        effective.eof = eof;
    }
    for (variant, token) in &cli.fields {
        effective.field_names.set_token(*variant, token.as_str());
    }

    if effective.chunk_size == 0 {
        return Err(ConfigError::InvalidValue(
            "chunk_size must be greater than 0".to_string(),
        ));
    }
    validate_field_names(&effective.field_names)?;

    Ok(effective)
}

// ============================================================================
// Tests
// ============================================================================
