//! Core domain types: content units, the board tree, and operation options.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BoardpressError;
use crate::tags;

/// Front-matter key that marks a file as a board.
pub const BOARD_MARKER_KEY: &str = "kanban-plugin:";

/// Canonical marker block emitted when a board needs one.
pub const BOARD_MARKER_BLOCK: &str = "---\n\nkanban-plugin: board\n\n---\n";

// ---------------------------------------------------------------------------
// SurfaceFormat / UnitLevel
// ---------------------------------------------------------------------------

/// The textual representation a content unit is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurfaceFormat {
    /// Sections (`## header`) holding items (`- [ ] title`).
    Board,
    /// Flat segments separated by `---` lines.
    Slides,
    /// Text that is never parsed into sections.
    Opaque,
}

impl SurfaceFormat {
    /// Decide the format of a freshly loaded document.
    ///
    /// A marker block, a `## ` header or an item line means [`Self::Board`];
    /// anything else is [`Self::Slides`].
    pub fn detect(text: &str) -> Self {
        if has_marker_block(text) {
            return Self::Board;
        }
        let structured = text
            .lines()
            .any(|line| line.starts_with("## ") || is_item_line(line));
        if structured { Self::Board } else { Self::Slides }
    }

    /// Decide the format of a section-level include target.
    ///
    /// Section files have no headers of their own, so only the marker block
    /// or item lines count as board syntax.
    pub fn detect_section(text: &str) -> Self {
        if has_marker_block(text) || text.lines().any(is_item_line) {
            Self::Board
        } else {
            Self::Slides
        }
    }
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Board => "board",
            Self::Slides => "slides",
            Self::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Whether `text` opens with a front-matter block carrying the board marker.
pub fn has_marker_block(text: &str) -> bool {
    let mut lines = text.lines();
    if lines.next().map(str::trim_end) != Some("---") {
        return false;
    }
    for line in lines {
        if line.trim_end() == "---" {
            return false;
        }
        if line.trim_start().starts_with(BOARD_MARKER_KEY) {
            return true;
        }
    }
    false
}

fn is_item_line(line: &str) -> bool {
    line.starts_with("- [ ] ")
        || line.starts_with("- [x] ")
        || line.starts_with("- [X] ")
        || matches!(line.trim_end(), "- [ ]" | "- [x]" | "- [X]")
}

/// Granularity of a content unit inside the board tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitLevel {
    /// A whole board (or a slide deck standing in for one).
    Document,
    /// The items of a single section, without a header.
    Section,
    /// A single item.
    Item,
}

// ---------------------------------------------------------------------------
// ContentUnit
// ---------------------------------------------------------------------------

/// One resolved file or extracted scope, tagged with its surface format.
///
/// Units are never mutated; every transform builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    /// File the unit was read from (`None` for in-memory roots).
    pub source_path: Option<PathBuf>,
    /// Surface format, fixed by whoever created the unit.
    pub format: SurfaceFormat,
    /// Granularity inside the board tree.
    pub level: UnitLevel,
    /// The unit's text.
    pub text: String,
    /// Tags attached to the unit (e.g. those on the directive that produced it).
    pub tags: BTreeSet<String>,
}

impl ContentUnit {
    /// Build a unit with no tags.
    pub fn new(
        source_path: Option<PathBuf>,
        format: SurfaceFormat,
        level: UnitLevel,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_path,
            format,
            level,
            text: text.into(),
            tags: BTreeSet::new(),
        }
    }

    /// Same unit with the given tags.
    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = tags;
        self
    }

    /// A new unit carrying `text`, keeping path, format, level and tags.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    /// A new unit in `format` carrying `text`.
    pub fn with_format(&self, format: SurfaceFormat, text: impl Into<String>) -> Self {
        Self {
            format,
            text: text.into(),
            ..self.clone()
        }
    }

    /// Directory relative references inside this unit resolve against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// File name of the source, if any.
    pub fn file_name(&self) -> Option<String> {
        self.source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }
}

// ---------------------------------------------------------------------------
// Board / Section / Item
// ---------------------------------------------------------------------------

/// The logical document tree parsed from board text.
///
/// Sections and items are shared behind `Arc` so scope extraction can build
/// new containers around the same leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    /// Raw front-matter block (including its `---` lines), if present.
    pub front_matter: Option<String>,
    /// Lines before the first section.
    pub notes: Vec<String>,
    /// Ordered sections.
    pub sections: Vec<Arc<Section>>,
}

impl Board {
    /// Whether the board carries the structured-format marker block.
    pub fn has_marker(&self) -> bool {
        self.front_matter.as_deref().is_some_and(has_marker_block)
    }

    /// Find an item by id, returning `(section index, item)`.
    pub fn find_item(&self, id: &str) -> Option<(usize, &Arc<Item>)> {
        self.sections.iter().enumerate().find_map(|(index, section)| {
            section
                .items
                .iter()
                .find(|item| item.id == id)
                .map(|item| (index, item))
        })
    }

    /// Total number of items across all sections.
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }
}

/// A titled group of items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// Header text after `## ` (title plus tags, possibly a directive).
    pub header: String,
    /// Lines between the header and the first item.
    pub notes: Vec<String>,
    /// Ordered items.
    pub items: Vec<Arc<Item>>,
}

impl Section {
    /// Row this section sits in (`#rowN`, default 1).
    pub fn row(&self) -> u32 {
        tags::row_of(&self.header)
    }

    /// Whether this section stacks under the previous one (`#stack`).
    pub fn is_stacked(&self) -> bool {
        tags::is_stacked(&self.header)
    }

    /// Tags present on the header.
    pub fn tags(&self) -> BTreeSet<String> {
        tags::tags_in(&self.header)
    }
}

/// A leaf content unit of the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// Positional id, `"<section>.<item>"`.
    pub id: String,
    /// Checkbox state.
    pub checked: bool,
    /// Title line.
    pub title: String,
    /// Body lines (indentation stripped), verbatim otherwise.
    pub body: String,
}

impl Item {
    /// Title and body as one block of text.
    pub fn full_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Sub-tree of a board selected for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// The whole document.
    #[default]
    Full,
    /// All sections tagged with the given row (1-based).
    Row(u32),
    /// One stack inside a row (row 1-based, stack 0-based).
    Stack { row: u32, stack: usize },
    /// A single section by 0-based index.
    Section(usize),
    /// A single item by id.
    Item(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Row(row) => write!(f, "row:{row}"),
            Self::Stack { row, stack } => write!(f, "stack:{row}:{stack}"),
            Self::Section(index) => write!(f, "section:{index}"),
            Self::Item(id) => write!(f, "item:{id}"),
        }
    }
}

impl FromStr for Scope {
    type Err = BoardpressError;

    /// Parse `full`, `row:N`, `stack:R:S`, `section:I` or `item:ID`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BoardpressError::validation(format!("invalid scope '{s}'"));
        let number = |part: &str| part.trim().parse::<usize>().map_err(|_| invalid());

        let mut parts = s.trim().splitn(2, ':');
        let kind = parts.next().unwrap_or_default().to_ascii_lowercase();
        let rest = parts.next();

        match (kind.as_str(), rest) {
            ("full", None) => Ok(Self::Full),
            ("row", Some(n)) => {
                let row = u32::try_from(number(n)?).map_err(|_| invalid())?;
                Ok(Self::Row(row))
            }
            ("stack", Some(rest)) => {
                let (row, stack) = rest.split_once(':').ok_or_else(invalid)?;
                let row = u32::try_from(number(row)?).map_err(|_| invalid())?;
                Ok(Self::Stack {
                    row,
                    stack: number(stack)?,
                })
            }
            ("section", Some(n)) => Ok(Self::Section(number(n)?)),
            ("item", Some(id)) if !id.trim().is_empty() => Ok(Self::Item(id.trim().to_string())),
            _ => Err(invalid()),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Surface format every emitted unit should end up in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatStrategy {
    /// Leave each unit in the format it was written in.
    #[default]
    Keep,
    /// Convert to board syntax.
    ToBoard,
    /// Convert to slide syntax.
    ToSlides,
}

/// How resolved includes end up in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncludeStrategy {
    /// Inline included content at the directive site.
    #[default]
    Merge,
    /// Emit included content as separate files and rewrite the directive.
    Separate,
}

/// What happens to referenced binary files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetStrategy {
    /// Inline small files as data URIs; larger ones are copied.
    Embed,
    /// Copy into the output's asset directory.
    #[default]
    Copy,
    /// Leave references untouched.
    Reference,
    /// Skip asset handling entirely.
    Ignore,
}

/// Which tags survive in the emitted text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagVisibility {
    /// Keep every tag.
    #[default]
    All,
    /// Drop layout tags (`#rowN`, `#stack`, `#span*`).
    HideLayout,
    /// Drop every tag.
    None,
}

macro_rules! kebab_enum_str {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $(Self::$variant => $name,)+
                })
            }
        }

        impl FromStr for $ty {
            type Err = BoardpressError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(BoardpressError::validation(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

kebab_enum_str!(FormatStrategy { Keep => "keep", ToBoard => "to-board", ToSlides => "to-slides" });
kebab_enum_str!(IncludeStrategy { Merge => "merge", Separate => "separate" });
kebab_enum_str!(AssetStrategy {
    Embed => "embed",
    Copy => "copy",
    Reference => "reference",
    Ignore => "ignore",
});
kebab_enum_str!(TagVisibility { All => "all", HideLayout => "hide-layout", None => "none" });

// ---------------------------------------------------------------------------
// OperationOptions
// ---------------------------------------------------------------------------

/// Declarative options for one pipeline invocation. Never mutated mid-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOptions {
    /// Sub-tree to export.
    pub scope: Scope,
    /// Target surface format.
    pub format_strategy: FormatStrategy,
    /// Merge or separate included files.
    pub include_strategy: IncludeStrategy,
    /// Asset handling.
    pub asset_strategy: AssetStrategy,
    /// Tag filter applied to emitted text.
    pub tag_visibility: TagVisibility,
    /// Whether documents converted to board syntax get a marker block.
    pub board_marker: bool,
    /// Directory all artifacts are written under.
    pub output_root: PathBuf,
    /// File name of the primary artifact (defaults to the root's file name).
    pub primary_name: Option<String>,
}

impl OperationOptions {
    /// Options with defaults for everything except the output root.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            scope: Scope::Full,
            format_strategy: FormatStrategy::Keep,
            include_strategy: IncludeStrategy::Merge,
            asset_strategy: AssetStrategy::Copy,
            tag_visibility: TagVisibility::All,
            board_marker: true,
            output_root: output_root.into(),
            primary_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_board_by_marker() {
        let text = "---\n\nkanban-plugin: board\n\n---\n\nplain text\n";
        assert_eq!(SurfaceFormat::detect(text), SurfaceFormat::Board);
    }

    #[test]
    fn detect_board_by_structure() {
        assert_eq!(
            SurfaceFormat::detect("## Todo\n- [ ] write docs\n"),
            SurfaceFormat::Board
        );
        assert_eq!(
            SurfaceFormat::detect("# Deck\n\n---\n\nsecond slide\n"),
            SurfaceFormat::Slides
        );
    }

    #[test]
    fn detect_section_ignores_headers() {
        assert_eq!(
            SurfaceFormat::detect_section("## Heading slide\n\n---\n\nnext\n"),
            SurfaceFormat::Slides
        );
        assert_eq!(
            SurfaceFormat::detect_section("- [x] done\n- [ ] open\n"),
            SurfaceFormat::Board
        );
    }

    #[test]
    fn front_matter_without_marker_is_not_a_marker() {
        assert!(!has_marker_block("---\ntitle: deck\n---\n# Hello\n"));
        assert!(has_marker_block("---\nkanban-plugin: basic\n---\n"));
    }

    #[test]
    fn unit_base_dir() {
        let unit = ContentUnit::new(
            Some(PathBuf::from("/boards/team/board.md")),
            SurfaceFormat::Board,
            UnitLevel::Document,
            "",
        );
        assert_eq!(unit.base_dir(), PathBuf::from("/boards/team"));
        assert_eq!(unit.file_name().as_deref(), Some("board.md"));

        let anonymous = ContentUnit::new(None, SurfaceFormat::Opaque, UnitLevel::Item, "x");
        assert_eq!(anonymous.base_dir(), PathBuf::from("."));
    }

    #[test]
    fn with_text_builds_new_unit() {
        let unit = ContentUnit::new(None, SurfaceFormat::Slides, UnitLevel::Section, "a");
        let next = unit.with_text("b");
        assert_eq!(unit.text, "a");
        assert_eq!(next.text, "b");
        assert_eq!(next.format, SurfaceFormat::Slides);
    }

    #[test]
    fn scope_parsing() {
        assert_eq!("full".parse::<Scope>().unwrap(), Scope::Full);
        assert_eq!("row:2".parse::<Scope>().unwrap(), Scope::Row(2));
        assert_eq!(
            "stack:1:0".parse::<Scope>().unwrap(),
            Scope::Stack { row: 1, stack: 0 }
        );
        assert_eq!("section:3".parse::<Scope>().unwrap(), Scope::Section(3));
        assert_eq!("item:0.1".parse::<Scope>().unwrap(), Scope::Item("0.1".into()));
        assert!("row".parse::<Scope>().is_err());
        assert!("stack:1".parse::<Scope>().is_err());
        assert!("column:1".parse::<Scope>().is_err());
    }

    #[test]
    fn scope_display_roundtrip() {
        for scope in [
            Scope::Full,
            Scope::Row(2),
            Scope::Stack { row: 3, stack: 1 },
            Scope::Section(0),
            Scope::Item("2.4".into()),
        ] {
            assert_eq!(scope.to_string().parse::<Scope>().unwrap(), scope);
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!("to-slides".parse::<FormatStrategy>().unwrap(), FormatStrategy::ToSlides);
        assert_eq!("Separate".parse::<IncludeStrategy>().unwrap(), IncludeStrategy::Separate);
        assert_eq!(AssetStrategy::Reference.to_string(), "reference");
        assert_eq!("hide-layout".parse::<TagVisibility>().unwrap(), TagVisibility::HideLayout);

        let err = "zip".parse::<AssetStrategy>().unwrap_err();
        assert!(err.to_string().contains("unknown AssetStrategy 'zip'"));
    }

    #[test]
    fn section_layout_accessors() {
        let section = Section {
            header: "Backlog #row2 #stack #urgent".into(),
            ..Section::default()
        };
        assert_eq!(section.row(), 2);
        assert!(section.is_stacked());
        assert!(section.tags().contains("urgent"));
    }

    #[test]
    fn board_find_item() {
        let board = Board {
            sections: vec![
                Arc::new(Section::default()),
                Arc::new(Section {
                    header: "Doing".into(),
                    notes: vec![],
                    items: vec![Arc::new(Item {
                        id: "1.0".into(),
                        title: "Ship it".into(),
                        ..Item::default()
                    })],
                }),
            ],
            ..Board::default()
        };
        let (section, item) = board.find_item("1.0").unwrap();
        assert_eq!(section, 1);
        assert_eq!(item.title, "Ship it");
        assert!(board.find_item("0.0").is_none());
        assert_eq!(board.item_count(), 1);
    }
}
