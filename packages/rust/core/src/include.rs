//! Include resolution over an explicit frame stack.
//!
//! Each file being resolved is a [`Frame`] holding its remaining pieces and
//! the text produced so far. Meeting a directive either pushes a child frame
//! or writes a placeholder; a finished child is spliced into its parent
//! (merge) or emitted as a satellite (separate). The frame stack doubles as
//! the visiting set for cycle detection.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use boardpress_artifacts::{rebase_references, text_hash};
use boardpress_markdown::{item_from_text, items_from_unit, serialize_item, serialize_items};
use boardpress_shared::paths::lexical_normalize;
use boardpress_shared::{
    ContentUnit, IncludeStrategy, Issue, IssueKind, Result, SurfaceFormat, UnitLevel,
};

use crate::context::{PipelineContext, same_file};
use crate::directive::{Directive, DirectiveKind, Piece, normalize_whitespace, parse_pieces};

/// A resolved unit and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUnit {
    /// The resolved unit, format tag fixed at creation.
    pub unit: ContentUnit,
    /// Directory the unit's relative references resolve against.
    pub base_dir: PathBuf,
    /// Output path under the output root.
    pub relative_path: String,
}

/// Output of [`IncludeResolver::resolve_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSet {
    /// The root unit with its directives resolved.
    pub primary: ResolvedUnit,
    /// Included files emitted on their own (separate strategy only).
    pub satellites: Vec<ResolvedUnit>,
}

/// One file in the middle of resolution.
struct Frame {
    path: Option<PathBuf>,
    base_dir: PathBuf,
    format: SurfaceFormat,
    level: UnitLevel,
    depth: usize,
    origin: Option<Directive>,
    pieces: VecDeque<Piece>,
    output: String,
}

impl Frame {
    fn root(unit: &ContentUnit) -> Self {
        let base_dir = unit.base_dir();
        Self {
            path: unit.source_path.as_deref().map(lexical_normalize),
            pieces: parse_pieces(&unit.text, &base_dir).into(),
            base_dir,
            format: unit.format,
            level: unit.level,
            depth: 0,
            origin: None,
            output: String::with_capacity(unit.text.len()),
        }
    }

    fn child(directive: Directive, text: &str, depth: usize) -> Self {
        let path = directive.resolved_path.clone();
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let (format, level) = match directive.kind {
            DirectiveKind::Content => (SurfaceFormat::Opaque, UnitLevel::Document),
            DirectiveKind::Section => (SurfaceFormat::detect_section(text), UnitLevel::Section),
            DirectiveKind::Item => (SurfaceFormat::Opaque, UnitLevel::Item),
        };
        Self {
            path: Some(path),
            pieces: parse_pieces(text, &base_dir).into(),
            base_dir,
            format,
            level,
            depth,
            origin: Some(directive),
            output: String::with_capacity(text.len()),
        }
    }
}

/// Why a directive could not be followed.
struct Refusal {
    kind: IssueKind,
    message: String,
}

/// Walks the include graph of one unit.
#[derive(Debug, Clone, Copy)]
pub struct IncludeResolver {
    strategy: IncludeStrategy,
    max_depth: usize,
}

impl IncludeResolver {
    /// Resolver for one strategy and depth limit.
    pub fn new(strategy: IncludeStrategy, max_depth: usize) -> Self {
        Self {
            strategy,
            max_depth,
        }
    }

    /// Resolve every directive reachable from `root`.
    ///
    /// Cycles, depth overruns and unreadable targets cut off only their own
    /// branch: the directive becomes a placeholder and an issue is recorded.
    /// The only error is cancellation.
    #[instrument(skip_all, fields(strategy = %self.strategy, max_depth = self.max_depth))]
    pub async fn resolve_all(
        &self,
        root: &ContentUnit,
        primary_name: &str,
        ctx: &mut PipelineContext,
    ) -> Result<ResolvedSet> {
        let mut root_frame = Frame::root(root);
        let root_dir = root_frame.base_dir.clone();
        let mut stack: Vec<Frame> = Vec::new();
        let mut satellites: Vec<ResolvedUnit> = Vec::new();
        let mut followed = 0usize;

        loop {
            let current = stack.last_mut().unwrap_or(&mut root_frame);
            match current.pieces.pop_front() {
                Some(Piece::Literal(text)) => current.output.push_str(&text),
                Some(Piece::Directive(directive)) => {
                    let depth = current.depth + 1;
                    let source = current.path.clone();
                    ctx.check_cancelled()?;

                    if directive.decode_failed {
                        ctx.report(Issue::new(
                            IssueKind::PathDecode,
                            directive.marker(),
                            source.clone(),
                            "argument could not be percent-decoded, used as written",
                        ));
                    }

                    let visiting = root_frame
                        .path
                        .iter()
                        .chain(stack.iter().filter_map(|f| f.path.as_ref()))
                        .any(|p| same_file(p, &directive.resolved_path));

                    match self.open(&directive, depth, visiting, ctx).await {
                        Ok(text) => {
                            followed += 1;
                            stack.push(Frame::child(directive, &text, depth));
                        }
                        Err(refusal) => {
                            let placeholder = placeholder(&directive, refusal.kind);
                            ctx.report(Issue::new(
                                refusal.kind,
                                directive.marker(),
                                source,
                                refusal.message,
                            ));
                            stack
                                .last_mut()
                                .unwrap_or(&mut root_frame)
                                .output
                                .push_str(&placeholder);
                        }
                    }
                }
                None => {
                    let Some(done) = stack.pop() else { break };
                    let parent_dir = stack
                        .last()
                        .map_or_else(|| root_frame.base_dir.clone(), |f| f.base_dir.clone());
                    let text = self.finish(done, &parent_dir, &root_dir, ctx, &mut satellites);
                    stack
                        .last_mut()
                        .unwrap_or(&mut root_frame)
                        .output
                        .push_str(&text);
                }
            }
        }

        info!(
            followed,
            satellites = satellites.len(),
            "include resolution complete"
        );

        Ok(ResolvedSet {
            primary: ResolvedUnit {
                unit: root.with_text(root_frame.output),
                base_dir: root_dir,
                relative_path: primary_name.to_string(),
            },
            satellites,
        })
    }

    /// Decide whether `directive` can be followed and load its target.
    async fn open(
        &self,
        directive: &Directive,
        depth: usize,
        visiting: bool,
        ctx: &mut PipelineContext,
    ) -> std::result::Result<std::sync::Arc<str>, Refusal> {
        if visiting {
            return Err(Refusal {
                kind: IssueKind::CycleDetected,
                message: format!(
                    "{} is already being resolved",
                    directive.resolved_path.display()
                ),
            });
        }
        if depth > self.max_depth {
            return Err(Refusal {
                kind: IssueKind::DepthExceeded,
                message: format!("include depth {depth} exceeds the limit of {}", self.max_depth),
            });
        }
        ctx.read_source(&directive.resolved_path)
            .await
            .map_err(|e| Refusal {
                kind: IssueKind::MissingInclude,
                message: format!("cannot read {}: {e}", directive.resolved_path.display()),
            })
    }

    /// Turn a finished child frame into the text that replaces its directive.
    fn finish(
        &self,
        done: Frame,
        parent_dir: &Path,
        root_dir: &Path,
        ctx: &mut PipelineContext,
        satellites: &mut Vec<ResolvedUnit>,
    ) -> String {
        let Some(directive) = done.origin else {
            return done.output;
        };

        match self.strategy {
            IncludeStrategy::Merge => {
                let text = rebase_references(&done.output, &done.base_dir, parent_dir);
                let unit = ContentUnit::new(done.path, done.format, done.level, text)
                    .with_tags(directive.tags());
                debug!(kind = %directive.kind, target = %directive.raw_argument, "merged include");
                merged_text(&directive, &unit)
            }
            IncludeStrategy::Separate => {
                let text = rebase_references(&done.output, &done.base_dir, root_dir);
                let hash = text_hash(&text);
                let claim = ctx.dedup.claim(&hash, &directive.file_name());
                if claim.is_new() {
                    debug!(path = claim.path(), "new satellite");
                    satellites.push(ResolvedUnit {
                        unit: ContentUnit::new(done.path, done.format, done.level, text)
                            .with_tags(directive.tags()),
                        base_dir: root_dir.to_path_buf(),
                        relative_path: claim.path().to_string(),
                    });
                }
                directive.rewritten(claim.path())
            }
        }
    }
}

/// Text that replaces a directive under the merge strategy.
fn merged_text(directive: &Directive, unit: &ContentUnit) -> String {
    match directive.kind {
        DirectiveKind::Content => unit.text.trim_end_matches('\n').to_string(),
        DirectiveKind::Section => {
            let header = normalize_whitespace(&format!(
                "{} {} {}",
                directive.prefix,
                directive.file_name(),
                directive.suffix
            ));
            let mut out = format!("{}{header}", directive.lead);
            let items = serialize_items(&items_from_unit(unit));
            if !items.is_empty() {
                out.push('\n');
                out.push_str(items.trim_end_matches('\n'));
            }
            out
        }
        DirectiveKind::Item => {
            let mut item = item_from_text(&unit.text, String::new());
            item.checked = directive.checked;
            item.title =
                normalize_whitespace(&format!("{} {} {}", directive.prefix, item.title, directive.suffix));
            serialize_item(&item).trim_end_matches('\n').to_string()
        }
    }
}

/// Inert marker left where a directive could not be followed. Header and
/// item lines keep their shape.
fn placeholder(directive: &Directive, kind: IssueKind) -> String {
    let comment = format!("<!-- boardpress: {kind}: {} -->", directive.raw_argument);
    match directive.kind {
        DirectiveKind::Content => comment,
        DirectiveKind::Section | DirectiveKind::Item => directive.with_marker_replaced(&comment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardpress_shared::PipelineConfig;
    use tokio_util::sync::CancellationToken;

    fn write(dir: &Path, rel: &str, text: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    fn root_unit(path: &Path) -> ContentUnit {
        let text = std::fs::read_to_string(path).unwrap();
        ContentUnit::new(
            Some(path.to_path_buf()),
            SurfaceFormat::detect(&text),
            UnitLevel::Document,
            text,
        )
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(PipelineConfig::default(), CancellationToken::new())
    }

    async fn resolve(strategy: IncludeStrategy, root: &Path, ctx: &mut PipelineContext) -> ResolvedSet {
        IncludeResolver::new(strategy, 16)
            .resolve_all(&root_unit(root), "board.md", ctx)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn merges_content_include() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "board.md", "## A\n- [ ] x\n  !!!include(notes/n.md)!!!\n");
        write(dir.path(), "notes/n.md", "note body\n![p](p.png)\n\n");

        let mut ctx = ctx();
        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx).await;
        assert!(set.satellites.is_empty());
        assert_eq!(
            set.primary.unit.text,
            "## A\n- [ ] x\n  note body\n![p](notes/p.png)\n"
        );
        assert!(ctx.issues.is_empty());
    }

    #[tokio::test]
    async fn merge_survives_references_nested_in_tags() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "board.md", "## A\n- [ ] x\n  !!!include(sub/n.md)!!!\n");
        write(dir.path(), "sub/n.md", "<img src=\"![a](b.png)\">\n");

        let mut ctx = ctx();
        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx).await;
        assert_eq!(
            set.primary.unit.text,
            "## A\n- [ ] x\n  <img src=\"sub/![a](b.png)\">\n"
        );
        assert!(ctx.issues.is_empty());
    }

    #[tokio::test]
    async fn section_include_rebuilds_header() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "board.md",
            "## Prefix   !!!sectioninclude(cols/todo.md)!!!   #tag\n\n## Other\n",
        );
        write(dir.path(), "cols/todo.md", "## Own Title\n- [ ] one\n- [x] two\n  detail\n");

        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx()).await;
        assert_eq!(
            set.primary.unit.text,
            "## Prefix todo.md #tag\n- [ ] one\n- [x] two\n  detail\n\n## Other\n"
        );
    }

    #[tokio::test]
    async fn item_include_never_splits() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "board.md", "## A\n- [x] !!!iteminclude(task.md)!!! #urgent\n");
        write(dir.path(), "task.md", "Task title\nfirst\n\n---\n\nsecond\n---\nthird\n");

        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx()).await;
        let board = boardpress_markdown::parse_board(&set.primary.unit.text);
        assert_eq!(board.item_count(), 1);
        let item = &board.sections[0].items[0];
        assert!(item.checked);
        assert_eq!(item.title, "Task title #urgent");
        assert_eq!(item.body, "first\n\n---\n\nsecond\n---\nthird");
    }

    #[tokio::test]
    async fn self_include_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "board.md", "top\n!!!include(./board.md)!!!\nbottom\n");

        let mut ctx = ctx();
        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx).await;
        assert_eq!(ctx.issues.errors.len(), 1);
        assert_eq!(ctx.issues.errors[0].kind, IssueKind::CycleDetected);
        assert_eq!(
            set.primary.unit.text,
            "top\n<!-- boardpress: cycle-detected: ./board.md -->\nbottom\n"
        );
    }

    #[tokio::test]
    async fn mutual_include_is_a_cycle_and_siblings_continue() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "a.md",
            "!!!include(b.md)!!!\n!!!include(missing.md)!!!\n!!!include(c.md)!!!\n",
        );
        write(dir.path(), "b.md", "in b\n!!!include(a.md)!!!\n");
        write(dir.path(), "c.md", "in c\n");

        let mut ctx = ctx();
        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx).await;
        assert_eq!(ctx.issues.errors.len(), 1);
        assert_eq!(ctx.issues.errors[0].kind, IssueKind::CycleDetected);
        assert_eq!(ctx.issues.warnings.len(), 1);
        assert_eq!(ctx.issues.warnings[0].kind, IssueKind::MissingInclude);
        assert!(set.primary.unit.text.contains("in b"));
        assert!(set.primary.unit.text.contains("in c"));
        assert!(set.primary.unit.text.contains("<!-- boardpress: missing-include: missing.md -->"));
    }

    #[tokio::test]
    async fn depth_limit_cuts_branch() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "d0.md", "0\n!!!include(d1.md)!!!\n");
        write(dir.path(), "d1.md", "1\n!!!include(d2.md)!!!\n");
        write(dir.path(), "d2.md", "2\n!!!include(d3.md)!!!\n");
        write(dir.path(), "d3.md", "3\n");

        let mut ctx = ctx();
        let set = IncludeResolver::new(IncludeStrategy::Merge, 2)
            .resolve_all(&root_unit(&root), "d0.md", &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.issues.errors[0].kind, IssueKind::DepthExceeded);
        assert!(set.primary.unit.text.contains("2\n<!-- boardpress: depth-exceeded: d3.md -->"));
    }

    #[tokio::test]
    async fn separate_emits_and_dedups_satellites() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "board.md",
            "## !!!sectioninclude(x/todo.md)!!!\n\n## !!!sectioninclude(y/todo.md)!!!\n\n## !!!sectioninclude(z/todo.md)!!!\n",
        );
        write(dir.path(), "x/todo.md", "- [ ] same\n");
        write(dir.path(), "y/todo.md", "- [ ] same\n");
        write(dir.path(), "z/todo.md", "- [ ] different\n");

        let mut ctx = ctx();
        ctx.dedup.reserve("board.md");
        let set = resolve(IncludeStrategy::Separate, &root, &mut ctx).await;

        let names: Vec<&str> = set.satellites.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(names, vec!["todo.md", "todo-2.md"]);
        assert_eq!(set.satellites[0].unit.format, SurfaceFormat::Board);
        assert_eq!(set.satellites[0].unit.level, UnitLevel::Section);
        assert_eq!(
            set.primary.unit.text,
            "## !!!sectioninclude(todo.md)!!!\n\n## !!!sectioninclude(todo.md)!!!\n\n## !!!sectioninclude(todo-2.md)!!!\n"
        );
    }

    #[tokio::test]
    async fn separate_resolves_nested_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "board.md", "!!!include(parts/outer.md)!!!\n");
        write(dir.path(), "parts/outer.md", "outer\n!!!include(inner/inner.md)!!!\n");
        write(dir.path(), "parts/inner/inner.md", "inner\n");

        let set = resolve(IncludeStrategy::Separate, &root, &mut ctx()).await;
        let names: Vec<&str> = set.satellites.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(names, vec!["inner.md", "outer.md"]);
        assert_eq!(set.satellites[1].unit.text, "outer\n!!!include(inner.md)!!!\n");
        assert_eq!(set.primary.unit.text, "!!!include(outer.md)!!!\n");
    }

    #[tokio::test]
    async fn cancellation_stops_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "board.md", "!!!include(a.md)!!!\n");
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = PipelineContext::new(PipelineConfig::default(), token);

        let err = IncludeResolver::new(IncludeStrategy::Merge, 16)
            .resolve_all(&root_unit(&root), "board.md", &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, boardpress_shared::BoardpressError::Cancelled));
    }

    #[tokio::test]
    async fn no_directives_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let text = "## A\n- [ ] x\n\n\n```\n!!!include(code.md)!!!\n```";
        let root = write(dir.path(), "board.md", text);
        let set = resolve(IncludeStrategy::Merge, &root, &mut ctx()).await;
        assert_eq!(set.primary.unit.text, text);
    }
}
