//! Output-side plumbing for boardpress.
//!
//! - [`references`]: scanning, rewriting and rebasing file references in text
//! - [`assets`]: binary asset discovery, hashing and relocation
//! - [`dedup`]: the content-hash keyed name table shared with satellites
//! - [`writer`]: staged, all-or-nothing artifact writes

pub mod assets;
pub mod dedup;
pub mod references;
pub mod writer;

pub use assets::{ASSET_DIR, AssetCollector, AssetRecord, ProcessedAssets, apply_records};
pub use dedup::{Claim, DedupMap, text_hash};
pub use references::{Reference, ReferenceKind, rebase_references, rewrite_references, scan_references};
pub use writer::{STAGING_PREFIX, write_artifacts};
