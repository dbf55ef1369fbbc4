//! Pipeline orchestration and domain logic for boardpress.
//!
//! This crate ties together scope extraction, include resolution, format
//! conversion and asset handling into the end-to-end export
//! ([`pipeline::execute`]).

pub mod assembler;
pub mod context;
pub mod directive;
pub mod include;
pub mod inspect;
pub mod pipeline;
pub mod scope;

pub use context::PipelineContext;
pub use directive::{Directive, DirectiveKind, scan_directives};
pub use include::{IncludeResolver, ResolvedSet, ResolvedUnit};
pub use inspect::{Inspection, inspect};
pub use pipeline::{PipelineResult, ProgressReporter, SilentProgress, execute, load_root};
pub use scope::{extract, scope_unit};
