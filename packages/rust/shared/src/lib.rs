//! Shared types, error model, and configuration for boardpress.
//!
//! This crate is the foundation depended on by all other boardpress crates.
//! It provides:
//! - [`BoardpressError`]: the unified error type
//! - Domain types ([`ContentUnit`], [`Board`], [`OperationOptions`], [`Scope`])
//! - Report types ([`Issue`], [`Artifact`])
//! - Path normalization ([`paths`]) and tag helpers ([`tags`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod paths;
pub mod report;
pub mod tags;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssetsConfig, DEFAULT_EMBED_MAX_BYTES, DEFAULT_HASH_CONCURRENCY,
    DEFAULT_MAX_INCLUDE_DEPTH, DefaultsConfig, HASH_WINDOW_BYTES, PipelineConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{BoardpressError, Result};
pub use report::{Artifact, ArtifactKind, ArtifactPayload, Issue, IssueKind, IssueLog};
pub use types::{
    AssetStrategy, BOARD_MARKER_BLOCK, Board, ContentUnit, FormatStrategy, IncludeStrategy,
    Item, OperationOptions, Scope, Section, SurfaceFormat, TagVisibility, UnitLevel,
};
