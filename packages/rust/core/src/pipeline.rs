//! End-to-end export pipeline: scope → includes → convert → assets → write.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use boardpress_artifacts::{AssetCollector, apply_records, write_artifacts};
use boardpress_markdown::{ConvertOptions, convert};
use boardpress_shared::tags::apply_visibility;
use boardpress_shared::{
    Artifact, BoardpressError, ContentUnit, Issue, IssueKind, IssueLog, OperationOptions,
    PipelineConfig, Result, SurfaceFormat, UnitLevel,
};

use crate::assembler;
use crate::context::PipelineContext;
use crate::include::{IncludeResolver, ResolvedUnit};
use crate::scope::scope_unit;

/// Primary artifact name used when the root has no file name.
pub const DEFAULT_PRIMARY_NAME: &str = "board.md";

/// Outcome of one export.
///
/// Always returned for document-content problems; those land in `warnings`
/// and `errors` while the rest of the document is still exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    /// Files written, primary first.
    pub artifacts: Vec<Artifact>,
    /// Recoverable problems.
    pub warnings: Vec<Issue>,
    /// Problems that cut off part of the output.
    pub errors: Vec<Issue>,
}

impl PipelineResult {
    fn from_log(artifacts: Vec<Artifact>, log: IssueLog) -> Self {
        Self {
            artifacts,
            warnings: log.warnings,
            errors: log.errors,
        }
    }

    /// Whether the run produced no errors.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per unit leaving include resolution.
    fn unit_resolved(&self, relative_path: &str);
    /// Called when an artifact is in place.
    fn artifact_written(&self, relative_path: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &PipelineResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn unit_resolved(&self, _relative_path: &str) {}
    fn artifact_written(&self, _relative_path: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &PipelineResult) {}
}

/// Read a root document from disk and tag it with its detected format.
pub async fn load_root(path: &Path) -> Result<ContentUnit> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BoardpressError::io(path, e))?;
    let format = SurfaceFormat::detect(&text);
    debug!(path = %path.display(), %format, "loaded root");
    Ok(ContentUnit::new(
        Some(path.to_path_buf()),
        format,
        UnitLevel::Document,
        text,
    ))
}

/// Name of the primary artifact for `root`.
pub fn primary_name(root: &ContentUnit, options: &OperationOptions) -> String {
    options
        .primary_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| root.file_name())
        .unwrap_or_else(|| DEFAULT_PRIMARY_NAME.to_string())
}

/// Run the full export pipeline.
///
/// 1. Narrow the root to `options.scope`
/// 2. Resolve include directives
/// 3. Convert every unit and filter its tags
/// 4. Collect and relocate assets
/// 5. Assemble and write the artifact set
///
/// Only setup failures (the output root cannot be created) and cancellation
/// are returned as `Err`. A failed write discards the whole artifact set and
/// comes back as the result's sole error.
#[instrument(skip_all, fields(
    root = %root.source_path.as_deref().unwrap_or(Path::new("<memory>")).display(),
    scope = %options.scope,
    includes = %options.include_strategy,
    assets = %options.asset_strategy,
))]
pub async fn execute(
    root: &ContentUnit,
    options: &OperationOptions,
    config: &PipelineConfig,
    cancel: CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<PipelineResult> {
    let start = Instant::now();
    info!(out = %options.output_root.display(), "starting export");

    tokio::fs::create_dir_all(&options.output_root)
        .await
        .map_err(|e| BoardpressError::io(&options.output_root, e))?;

    let mut ctx = PipelineContext::new(config.clone(), cancel);

    // --- Phase 1: Scope ---
    progress.phase("Extracting scope");
    let scoped = match scope_unit(root, &options.scope) {
        Ok(scoped) => scoped,
        Err(BoardpressError::Scope { message }) => {
            ctx.report(Issue::new(
                IssueKind::ScopeOutOfRange,
                options.scope.to_string(),
                root.source_path.clone(),
                message,
            ));
            return Ok(finish(PipelineResult::from_log(Vec::new(), ctx.issues), progress));
        }
        Err(e) => return Err(e),
    };
    if scoped.is_empty {
        info!("scope selected nothing, no artifacts");
        return Ok(finish(PipelineResult::from_log(Vec::new(), ctx.issues), progress));
    }

    // --- Phase 2: Includes ---
    progress.phase("Resolving includes");
    let primary_name = primary_name(root, options);
    ctx.dedup.reserve(primary_name.as_str());
    let resolver = IncludeResolver::new(options.include_strategy, ctx.config.max_include_depth);
    let resolved = resolver
        .resolve_all(&scoped.unit, &primary_name, &mut ctx)
        .await?;

    let mut units: Vec<ResolvedUnit> = Vec::with_capacity(1 + resolved.satellites.len());
    units.push(resolved.primary);
    units.extend(resolved.satellites);
    for unit in &units {
        progress.unit_resolved(&unit.relative_path);
    }

    // --- Phase 3: Convert ---
    progress.phase("Converting");
    let convert_opts = ConvertOptions {
        board_marker: options.board_marker,
    };
    let units: Vec<ResolvedUnit> = units
        .into_iter()
        .map(|resolved| {
            let converted = convert(&resolved.unit, options.format_strategy, &convert_opts);
            let text = apply_visibility(&converted.text, options.tag_visibility);
            ResolvedUnit {
                unit: converted.with_text(text),
                ..resolved
            }
        })
        .collect();

    // --- Phase 4: Assets ---
    progress.phase("Collecting assets");
    ctx.check_cancelled()?;
    let collector = AssetCollector::new(&ctx.config);
    let mut records = Vec::new();
    for resolved in &units {
        let (found, issues) = collector.collect(
            &resolved.unit.text,
            &resolved.base_dir,
            resolved.unit.source_path.as_deref(),
            options.asset_strategy,
        );
        records.extend(found);
        issues.into_iter().for_each(|issue| ctx.report(issue));
    }
    let cancel = ctx.cancel_token().clone();
    let processed = collector
        .process(records, options.asset_strategy, &mut ctx.dedup, &cancel)
        .await?;
    processed.issues.into_iter().for_each(|issue| ctx.report(issue));

    let units: Vec<ResolvedUnit> = units
        .into_iter()
        .map(|resolved| {
            let text = apply_records(&resolved.unit.text, &resolved.base_dir, &processed.records);
            ResolvedUnit {
                unit: resolved.unit.with_text(text),
                ..resolved
            }
        })
        .collect();

    // --- Phase 5: Assemble + write ---
    progress.phase("Writing artifacts");
    let Some((primary, satellites)) = units.split_first() else {
        return Ok(finish(PipelineResult::from_log(Vec::new(), ctx.issues), progress));
    };
    let artifacts = assembler::assemble(primary, satellites, processed.artifacts)?;

    let total = artifacts.len();
    let mut current = 0usize;
    let written = write_artifacts(&options.output_root, &artifacts, &cancel, |path| {
        current += 1;
        progress.artifact_written(path, current, total);
    })
    .await;

    let result = match written {
        Ok(_) => PipelineResult::from_log(artifacts, ctx.issues),
        Err(BoardpressError::Write { path, source }) => {
            warn!(path = %path.display(), error = %source, "write failed, export abandoned");
            let issue = Issue::new(
                IssueKind::Write,
                path.display().to_string(),
                None,
                source.to_string(),
            );
            PipelineResult {
                artifacts: Vec::new(),
                warnings: ctx.issues.warnings,
                errors: vec![issue],
            }
        }
        Err(e) => return Err(e),
    };

    info!(
        artifacts = result.artifacts.len(),
        warnings = result.warnings.len(),
        errors = result.errors.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "export complete"
    );
    Ok(finish(result, progress))
}

fn finish(result: PipelineResult, progress: &dyn ProgressReporter) -> PipelineResult {
    progress.done(&result);
    result
}
