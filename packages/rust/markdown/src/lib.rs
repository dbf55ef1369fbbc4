//! Board and slide syntax, and conversion between them.
//!
//! [`convert`] is a pure transform over [`ContentUnit`]s. It never fails:
//! malformed input degrades to a single section or a single item.

pub mod board;
pub mod slides;

use std::sync::Arc;

use tracing::{debug, instrument};

use boardpress_shared::{
    BOARD_MARKER_BLOCK, Board, ContentUnit, FormatStrategy, Item, Section, SurfaceFormat,
    UnitLevel, types::has_marker_block,
};

pub use board::{parse_board, parse_items, serialize_board, serialize_item, serialize_items};
pub use slides::{join_segments, split_segments};

/// Header given to slides that precede any `## ` heading.
pub const UNTITLED_SECTION: &str = "Untitled";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for format conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Insert the marker block when a document is converted to board syntax.
    pub board_marker: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { board_marker: true }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert `unit` according to `strategy`.
///
/// `Keep`, opaque units, item-level units and units already in the target
/// format come back unchanged. Everything else is rebuilt in the target
/// syntax and ends with exactly one newline.
#[instrument(skip_all, fields(format = %unit.format, level = ?unit.level, ?strategy))]
pub fn convert(unit: &ContentUnit, strategy: FormatStrategy, opts: &ConvertOptions) -> ContentUnit {
    let target = match strategy {
        FormatStrategy::Keep => return unit.clone(),
        FormatStrategy::ToBoard => SurfaceFormat::Board,
        FormatStrategy::ToSlides => SurfaceFormat::Slides,
    };

    if unit.format == SurfaceFormat::Opaque
        || unit.format == target
        || unit.level == UnitLevel::Item
    {
        return unit.clone();
    }

    let text = match (target, unit.level) {
        (SurfaceFormat::Slides, UnitLevel::Document) => board_to_slides(&unit.text),
        (SurfaceFormat::Slides, _) => items_to_slides(&unit.text),
        (SurfaceFormat::Board, UnitLevel::Document) => slides_to_board(&unit.text, opts),
        (SurfaceFormat::Board, _) => slides_to_items(unit),
        (SurfaceFormat::Opaque, _) => return unit.clone(),
    };

    debug!(from = %unit.format, to = %target, len = text.len(), "converted unit");
    unit.with_format(target, text)
}

/// Board document to slides: one segment per section header (with its
/// notes), then one per item. A marker block is dropped; other front matter
/// is kept ahead of the first segment.
fn board_to_slides(text: &str) -> String {
    let board = parse_board(text);

    let mut segments: Vec<String> = Vec::new();
    if !board.notes.is_empty() {
        segments.push(board.notes.join("\n"));
    }
    for section in &board.sections {
        let mut header = format!("## {}", section.header).trim_end().to_string();
        for line in &section.notes {
            header.push('\n');
            header.push_str(line);
        }
        segments.push(header);
        segments.extend(section.items.iter().map(|item| item.full_text()));
    }

    let body = join_segments(&segments);
    match board.front_matter.as_deref() {
        Some(front) if !has_marker_block(front) => {
            ensure_single_trailing_newline(&format!("{}\n{body}", front.trim_end()))
        }
        _ => body,
    }
}

/// Section-level board text to slides: one segment per item.
fn items_to_slides(text: &str) -> String {
    let items = parse_items(text);
    let segments: Vec<String> = items.iter().map(Item::full_text).collect();
    join_segments(&segments)
}

/// Slides document to a board (see [`slides_board`] for the policy).
fn slides_to_board(text: &str, opts: &ConvertOptions) -> String {
    let mut board = slides_board(text);
    if opts.board_marker && !board.has_marker() {
        board.front_matter = Some(with_marker(board.front_matter.as_deref()));
    }
    serialize_board(&board)
}

/// Section-level slides to board items: one item per segment.
fn slides_to_items(unit: &ContentUnit) -> String {
    ensure_single_trailing_newline(&serialize_items(&items_from_unit(unit)))
}

/// Build a board from slide text.
///
/// A segment whose first non-blank line is a `## ` heading opens a section;
/// the rest of that segment becomes the section's first item. Segments
/// before any heading land in an [`UNTITLED_SECTION`]. Every other segment
/// becomes one item.
pub fn slides_board(text: &str) -> Board {
    let (front_matter, body) = board::split_front_matter(text);

    let mut sections: Vec<Section> = Vec::new();
    for segment in split_segments(body) {
        let first = segment.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

        if let Some(header) = first.strip_prefix("## ") {
            let rest: String = segment
                .lines()
                .skip_while(|l| !l.starts_with("## "))
                .skip(1)
                .collect::<Vec<_>>()
                .join("\n");
            let mut section = Section {
                header: header.trim_end().to_string(),
                ..Section::default()
            };
            if !rest.trim().is_empty() {
                section.items.push(Arc::new(item_from_text(&rest, String::new())));
            }
            sections.push(section);
            continue;
        }

        if sections.is_empty() {
            sections.push(Section {
                header: UNTITLED_SECTION.to_string(),
                ..Section::default()
            });
        }
        if let Some(section) = sections.last_mut() {
            section.items.push(Arc::new(item_from_text(&segment, String::new())));
        }
    }

    let sections = sections
        .into_iter()
        .enumerate()
        .map(|(s, mut section)| {
            section.items = section
                .items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let mut item = Arc::unwrap_or_clone(item);
                    item.id = format!("{s}.{i}");
                    Arc::new(item)
                })
                .collect();
            Arc::new(section)
        })
        .collect();

    Board {
        front_matter: front_matter.map(str::to_string),
        notes: Vec::new(),
        sections,
    }
}

/// Parse any document-level unit into a board.
///
/// Board units are parsed directly, slide units go through
/// [`slides_board`], and opaque text becomes one untitled section holding a
/// single item.
pub fn board_from_unit(unit: &ContentUnit) -> Board {
    match unit.format {
        SurfaceFormat::Board => parse_board(&unit.text),
        SurfaceFormat::Slides => slides_board(&unit.text),
        SurfaceFormat::Opaque => {
            let item = item_from_text(&unit.text, "0.0".to_string());
            Board {
                sections: vec![Arc::new(Section {
                    header: UNTITLED_SECTION.to_string(),
                    notes: Vec::new(),
                    items: vec![Arc::new(item)],
                })],
                ..Board::default()
            }
        }
    }
}

/// Items of a section-level unit, whatever its format.
///
/// Board text yields its item lines, slides yield one item per segment and
/// opaque text yields exactly one item.
pub fn items_from_unit(unit: &ContentUnit) -> Vec<Item> {
    match unit.format {
        SurfaceFormat::Board => parse_items(&unit.text),
        SurfaceFormat::Slides => split_segments(&unit.text)
            .iter()
            .enumerate()
            .map(|(index, segment)| item_from_text(segment, index.to_string()))
            .collect(),
        SurfaceFormat::Opaque => vec![item_from_text(&unit.text, "0".to_string())],
    }
}

/// Build exactly one item from arbitrary text.
///
/// The first non-blank line is the title (a leading checkbox is stripped and
/// sets the checked state); everything after it is the body. Blank lines at
/// the body's edges are dropped, since a serialized board item cannot carry
/// them; everything between is kept verbatim. Delimiter lines are never split
/// on.
pub fn item_from_text(text: &str, id: String) -> Item {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    let first = lines.next().unwrap_or("").trim_end();

    let (checked, title) = strip_checkbox(first);

    let body_lines: Vec<&str> = lines.collect();
    let start = body_lines.iter().position(|l| !l.trim().is_empty());
    let end = body_lines.iter().rposition(|l| !l.trim().is_empty());
    let body = match (start, end) {
        (Some(start), Some(end)) => body_lines[start..=end].join("\n"),
        _ => String::new(),
    };

    Item {
        id,
        checked,
        title: title.to_string(),
        body,
    }
}

fn strip_checkbox(line: &str) -> (bool, &str) {
    for (prefix, checked) in [("- [ ]", false), ("- [x]", true), ("- [X]", true)] {
        if let Some(rest) = line.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with(' ') {
                return (checked, rest.trim_start());
            }
        }
    }
    (false, line)
}

/// Add `kanban-plugin: board` to existing front matter, or produce the
/// canonical marker block.
fn with_marker(front_matter: Option<&str>) -> String {
    let Some(front) = front_matter else {
        return BOARD_MARKER_BLOCK.to_string();
    };
    let trimmed = front.trim_end();
    match trimmed.strip_suffix("---") {
        Some(open) => format!("{}\nkanban-plugin: board\n\n---\n", open.trim_end()),
        None => BOARD_MARKER_BLOCK.to_string(),
    }
}

/// Trim trailing newlines and append exactly one. Blank text becomes empty.
pub fn ensure_single_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end_matches(['\n', '\r']);
    if trimmed.trim().is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push_str(trimmed);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(format: SurfaceFormat, text: &str) -> ContentUnit {
        ContentUnit::new(None, format, UnitLevel::Document, text)
    }

    const BOARD: &str = "---\n\nkanban-plugin: board\n\n---\n\n## Todo #row1\n- [ ] Write draft\n  details here\n- [x] Done\n\n## Later\n- [ ] Ship\n";

    #[test]
    fn keep_is_identity() {
        let unit = doc(SurfaceFormat::Board, "## A\n- [ ] x\n\n\n");
        let kept = convert(&unit, FormatStrategy::Keep, &ConvertOptions::default());
        assert_eq!(kept.text, unit.text);
        assert_eq!(kept, unit);
    }

    #[test]
    fn same_format_and_opaque_pass_through() {
        let board = doc(SurfaceFormat::Board, "## A\n");
        assert_eq!(
            convert(&board, FormatStrategy::ToBoard, &ConvertOptions::default()).text,
            "## A\n"
        );
        let opaque = doc(SurfaceFormat::Opaque, "a\n---\nb");
        assert_eq!(
            convert(&opaque, FormatStrategy::ToSlides, &ConvertOptions::default()).text,
            "a\n---\nb"
        );
    }

    #[test]
    fn board_to_slides_drops_marker() {
        let out = convert(
            &doc(SurfaceFormat::Board, BOARD),
            FormatStrategy::ToSlides,
            &ConvertOptions::default(),
        );
        assert_eq!(out.format, SurfaceFormat::Slides);
        assert_eq!(
            out.text,
            "## Todo #row1\n\n---\n\nWrite draft\ndetails here\n\n---\n\nDone\n\n---\n\n## Later\n\n---\n\nShip\n"
        );
        assert!(!out.text.contains("kanban-plugin"));
    }

    #[test]
    fn slides_to_board_policy() {
        let slides = "intro slide\n\n---\n\n## Plan\nfirst step\nmore\n\n---\n\nsecond step\n\n---\n\n## Empty\n";
        let out = convert(
            &doc(SurfaceFormat::Slides, slides),
            FormatStrategy::ToBoard,
            &ConvertOptions { board_marker: true },
        );
        assert_eq!(out.format, SurfaceFormat::Board);
        assert_eq!(
            out.text,
            "---\n\nkanban-plugin: board\n\n---\n\n## Untitled\n- [ ] intro slide\n\n## Plan\n- [ ] first step\n  more\n- [ ] second step\n\n## Empty\n"
        );
    }

    #[test]
    fn slides_to_board_without_marker() {
        let out = convert(
            &doc(SurfaceFormat::Slides, "one\n---\ntwo\n"),
            FormatStrategy::ToBoard,
            &ConvertOptions { board_marker: false },
        );
        assert_eq!(out.text, "## Untitled\n- [ ] one\n- [ ] two\n");
    }

    #[test]
    fn marker_merges_into_existing_front_matter() {
        let out = convert(
            &doc(SurfaceFormat::Slides, "---\ntitle: deck\n---\n\n## A\n"),
            FormatStrategy::ToBoard,
            &ConvertOptions::default(),
        );
        assert!(out.text.starts_with("---\ntitle: deck\nkanban-plugin: board\n\n---\n"));
        assert!(parse_board(&out.text).has_marker());
    }

    #[test]
    fn section_level_conversion() {
        let unit = ContentUnit::new(
            None,
            SurfaceFormat::Slides,
            UnitLevel::Section,
            "a\nbody\n\n---\n\nb\n",
        );
        let board = convert(&unit, FormatStrategy::ToBoard, &ConvertOptions::default());
        assert_eq!(board.text, "- [ ] a\n  body\n- [ ] b\n");

        let back = convert(&board, FormatStrategy::ToSlides, &ConvertOptions::default());
        assert_eq!(back.text, "a\nbody\n\n---\n\nb\n");
    }

    #[test]
    fn item_text_is_never_split() {
        let item = item_from_text("\n- [x] Title line\nbody one\n\n---\n\nbody two\n\n", "0".into());
        assert!(item.checked);
        assert_eq!(item.title, "Title line");
        assert_eq!(item.body, "body one\n\n---\n\nbody two");
    }

    #[test]
    fn item_body_drops_only_edge_blank_lines() {
        let item = item_from_text("Title\n\n\n  indented\n\n\ntail  \n\n", "0".into());
        assert_eq!(item.body, "  indented\n\n\ntail  ");

        let round = parse_items(&serialize_item(&item));
        assert_eq!(round[0].body, item.body);
    }

    #[test]
    fn item_level_units_are_untouched() {
        let unit = ContentUnit::new(None, SurfaceFormat::Slides, UnitLevel::Item, "a\n---\nb\n");
        let out = convert(&unit, FormatStrategy::ToBoard, &ConvertOptions::default());
        assert_eq!(out, unit);
    }

    #[test]
    fn items_from_each_format() {
        let section = |format, text| ContentUnit::new(None, format, UnitLevel::Section, text);
        assert_eq!(
            items_from_unit(&section(SurfaceFormat::Board, "- [ ] a\n- [x] b\n")).len(),
            2
        );
        assert_eq!(
            items_from_unit(&section(SurfaceFormat::Slides, "a\n---\nb\n---\nc\n")).len(),
            3
        );
        let opaque = items_from_unit(&section(SurfaceFormat::Opaque, "t\nx\n---\ny\n"));
        assert_eq!(opaque.len(), 1);
        assert_eq!(opaque[0].body, "x\n---\ny");
    }

    #[test]
    fn board_from_opaque_unit() {
        let board = board_from_unit(&doc(SurfaceFormat::Opaque, "just text\nmore"));
        assert_eq!(board.sections.len(), 1);
        assert_eq!(board.sections[0].items[0].id, "0.0");
        assert_eq!(board.sections[0].items[0].body, "more");
    }

    #[test]
    fn single_trailing_newline() {
        assert_eq!(ensure_single_trailing_newline("a\n\n\n"), "a\n");
        assert_eq!(ensure_single_trailing_newline("a"), "a\n");
        assert_eq!(ensure_single_trailing_newline("\n\n"), "");
    }

    #[test]
    fn conversion_never_fails_on_garbage() {
        for text in ["", "---", "\n\n---\n---\n", "- [ ]", "## "] {
            for strategy in [FormatStrategy::ToBoard, FormatStrategy::ToSlides] {
                for format in [SurfaceFormat::Board, SurfaceFormat::Slides] {
                    let _ = convert(&doc(format, text), strategy, &ConvertOptions::default());
                }
            }
        }
    }
}
