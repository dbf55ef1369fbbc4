//! Application configuration for boardpress.
//!
//! User config lives at `~/.boardpress/boardpress.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BoardpressError, Result};
use crate::types::{AssetStrategy, FormatStrategy, IncludeStrategy, TagVisibility};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "boardpress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".boardpress";

/// Maximum include nesting before a branch is cut off.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Files larger than this are hashed over their first `HASH_WINDOW_BYTES`
/// bytes plus their length.
pub const HASH_WINDOW_BYTES: u64 = 1024 * 1024;

/// Largest asset inlined by the embed strategy.
pub const DEFAULT_EMBED_MAX_BYTES: u64 = 256 * 1024;

/// Assets hashed concurrently.
pub const DEFAULT_HASH_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// Config structs (matching boardpress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default operation options.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Asset handling limits.
    #[serde(default)]
    pub assets: AssetsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Target surface format.
    #[serde(default)]
    pub format_strategy: FormatStrategy,

    /// Merge or separate included files.
    #[serde(default)]
    pub include_strategy: IncludeStrategy,

    /// Asset handling.
    #[serde(default)]
    pub asset_strategy: AssetStrategy,

    /// Tag filter for emitted text.
    #[serde(default)]
    pub tag_visibility: TagVisibility,

    /// Maximum include nesting depth.
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,

    /// Insert the board marker block when converting to board syntax.
    #[serde(default = "default_true")]
    pub board_marker: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            format_strategy: FormatStrategy::default(),
            include_strategy: IncludeStrategy::default(),
            asset_strategy: AssetStrategy::default(),
            tag_visibility: TagVisibility::default(),
            max_include_depth: default_max_include_depth(),
            board_marker: true,
        }
    }
}

fn default_max_include_depth() -> usize {
    DEFAULT_MAX_INCLUDE_DEPTH
}
fn default_true() -> bool {
    true
}

/// `[assets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Largest file (in bytes) inlined by the embed strategy.
    #[serde(default = "default_embed_max_bytes")]
    pub embed_max_bytes: u64,

    /// Bytes hashed from the start of large files.
    #[serde(default = "default_hash_window_bytes")]
    pub hash_window_bytes: u64,

    /// Number of assets hashed concurrently.
    #[serde(default = "default_hash_concurrency")]
    pub hash_concurrency: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            embed_max_bytes: default_embed_max_bytes(),
            hash_window_bytes: default_hash_window_bytes(),
            hash_concurrency: default_hash_concurrency(),
        }
    }
}

fn default_embed_max_bytes() -> u64 {
    DEFAULT_EMBED_MAX_BYTES
}
fn default_hash_window_bytes() -> u64 {
    HASH_WINDOW_BYTES
}
fn default_hash_concurrency() -> usize {
    DEFAULT_HASH_CONCURRENCY
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime limits, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime limits for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum include nesting depth.
    pub max_include_depth: usize,
    /// Largest asset inlined by the embed strategy.
    pub embed_max_bytes: u64,
    /// Bytes hashed from the start of large files.
    pub hash_window_bytes: u64,
    /// Number of assets hashed concurrently.
    pub hash_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_include_depth: config.defaults.max_include_depth,
            embed_max_bytes: config.assets.embed_max_bytes,
            hash_window_bytes: config.assets.hash_window_bytes.max(1),
            hash_concurrency: config.assets.hash_concurrency.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.boardpress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BoardpressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.boardpress/boardpress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BoardpressError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BoardpressError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BoardpressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BoardpressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BoardpressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_include_depth = 16"));
        assert!(toml_str.contains("asset_strategy = \"copy\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_include_depth, DEFAULT_MAX_INCLUDE_DEPTH);
        assert_eq!(parsed.assets.hash_window_bytes, HASH_WINDOW_BYTES);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[defaults]
include_strategy = "separate"
tag_visibility = "hide-layout"

[assets]
embed_max_bytes = 1024
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.include_strategy, IncludeStrategy::Separate);
        assert_eq!(config.defaults.tag_visibility, TagVisibility::HideLayout);
        assert_eq!(config.defaults.format_strategy, FormatStrategy::Keep);
        assert!(config.defaults.board_marker);
        assert_eq!(config.assets.embed_max_bytes, 1024);
        assert_eq!(config.assets.hash_concurrency, DEFAULT_HASH_CONCURRENCY);
    }

    #[test]
    fn unknown_strategy_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("boardpress.toml");
        std::fs::write(&path, "[defaults]\nasset_strategy = \"zip\"\n").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let mut app = AppConfig::default();
        app.assets.hash_concurrency = 0;
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.max_include_depth, 16);
        assert_eq!(pipeline.embed_max_bytes, DEFAULT_EMBED_MAX_BYTES);
        assert_eq!(pipeline.hash_concurrency, 1);
    }
}
