//! Board syntax: `## ` sections holding `- [ ] ` items.
//!
//! Parsing never fails. Text that is neither a header nor an item is kept as
//! notes or item body so serialization loses nothing but blank-line padding.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use boardpress_shared::{Board, Item, Section};

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[([ xX])\](?: (.*))?$").expect("valid regex"));

/// How a single line reads in board syntax.
enum Line<'a> {
    Header(&'a str),
    Item { checked: bool, title: &'a str },
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if let Some(header) = line.strip_prefix("## ") {
        return Line::Header(header.trim_end());
    }
    if line.trim_end() == "##" {
        return Line::Header("");
    }
    if let Some(caps) = ITEM_RE.captures(line.trim_end()) {
        let checked = !caps[1].trim().is_empty();
        let title = caps.get(2).map_or("", |m| m.as_str());
        return Line::Item { checked, title };
    }
    Line::Text(line)
}

/// Item being accumulated line by line.
struct ItemDraft {
    checked: bool,
    title: String,
    body: Vec<String>,
}

impl ItemDraft {
    fn new(checked: bool, title: &str) -> Self {
        Self {
            checked,
            title: title.to_string(),
            body: Vec::new(),
        }
    }

    fn finish(mut self, id: String) -> Item {
        trim_blank_edges(&mut self.body);
        Item {
            id,
            checked: self.checked,
            title: self.title,
            body: self.body.join("\n"),
        }
    }
}

/// Split a leading `---` front-matter block from the rest of the text.
///
/// The returned block includes both delimiter lines and the trailing newline.
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');

    match lines.next() {
        Some(first) if first.trim_end() == "---" => offset += first.len(),
        _ => return (None, text),
    }
    for line in lines {
        offset += line.len();
        if line.trim_end() == "---" {
            return (Some(&text[..offset]), &text[offset..]);
        }
    }
    (None, text)
}

/// Remove a two-space or single-tab body indent.
fn strip_indent(line: &str) -> &str {
    line.strip_prefix("  ")
        .or_else(|| line.strip_prefix('\t'))
        .unwrap_or(line)
}

fn trim_blank_edges(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..leading);
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Parse a whole board document.
pub fn parse_board(text: &str) -> Board {
    let (front_matter, body) = split_front_matter(text);

    let mut notes: Vec<String> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    let mut draft: Option<ItemDraft> = None;
    let mut in_fence = false;

    // Ids are assigned once every section is known.
    fn flush(draft: &mut Option<ItemDraft>, sections: &mut [Section]) {
        if let (Some(item), Some(section)) = (draft.take(), sections.last_mut()) {
            section.items.push(Arc::new(item.finish(String::new())));
        }
    }

    for line in body.lines() {
        let kind = if in_fence { Line::Text(line) } else { classify(line) };

        match kind {
            Line::Header(header) => {
                flush(&mut draft, &mut sections);
                sections.push(Section {
                    header: header.to_string(),
                    ..Section::default()
                });
            }
            Line::Item { checked, title } if !sections.is_empty() => {
                flush(&mut draft, &mut sections);
                draft = Some(ItemDraft::new(checked, title));
            }
            Line::Item { .. } | Line::Text(_) => {
                if is_fence(line) {
                    in_fence = !in_fence;
                }
                if let Some(item) = draft.as_mut() {
                    item.body.push(strip_indent(line).to_string());
                } else if let Some(section) = sections.last_mut() {
                    section.notes.push(line.to_string());
                } else {
                    notes.push(line.to_string());
                }
            }
        }
    }
    flush(&mut draft, &mut sections);

    trim_blank_edges(&mut notes);
    let sections = sections
        .into_iter()
        .enumerate()
        .map(|(section_index, mut section)| {
            trim_blank_edges(&mut section.notes);
            section.items = section
                .items
                .into_iter()
                .enumerate()
                .map(|(item_index, item)| {
                    let mut item = Arc::unwrap_or_clone(item);
                    item.id = format!("{section_index}.{item_index}");
                    Arc::new(item)
                })
                .collect();
            Arc::new(section)
        })
        .collect::<Vec<_>>();

    debug!(sections = sections.len(), "parsed board");

    Board {
        front_matter: front_matter.map(str::to_string),
        notes,
        sections,
    }
}

/// Parse the items of a section-level unit written in board syntax.
///
/// Headers are ignored (their items are flattened in order) and text before
/// the first item is dropped.
pub fn parse_items(text: &str) -> Vec<Item> {
    let (_, body) = split_front_matter(text);

    let mut items: Vec<Item> = Vec::new();
    let mut draft: Option<ItemDraft> = None;
    let mut in_fence = false;
    let mut dropped = 0usize;

    for line in body.lines() {
        let kind = if in_fence { Line::Text(line) } else { classify(line) };
        match kind {
            Line::Header(_) => {
                if let Some(item) = draft.take() {
                    items.push(item.finish(items.len().to_string()));
                }
            }
            Line::Item { checked, title } => {
                if let Some(item) = draft.take() {
                    items.push(item.finish(items.len().to_string()));
                }
                draft = Some(ItemDraft::new(checked, title));
            }
            Line::Text(text) => {
                if is_fence(text) {
                    in_fence = !in_fence;
                }
                match draft.as_mut() {
                    Some(item) => item.body.push(strip_indent(text).to_string()),
                    None if !text.trim().is_empty() => dropped += 1,
                    None => {}
                }
            }
        }
    }
    if let Some(item) = draft.take() {
        items.push(item.finish(items.len().to_string()));
    }

    if dropped > 0 {
        debug!(dropped, "dropped text before the first item of a section unit");
    }
    items
}

/// Serialize one item as a `- [ ] ` line plus indented body.
pub fn serialize_item(item: &Item) -> String {
    let mut out = String::new();
    out.push_str(if item.checked { "- [x]" } else { "- [ ]" });
    if !item.title.is_empty() {
        out.push(' ');
        out.push_str(&item.title);
    }
    out.push('\n');
    if !item.body.is_empty() {
        for line in item.body.lines() {
            if !line.is_empty() {
                out.push_str("  ");
                out.push_str(line);
            }
            out.push('\n');
        }
    }
    out
}

/// Serialize a list of items (a section-level unit).
pub fn serialize_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> String {
    items.into_iter().map(serialize_item).collect()
}

/// Serialize a whole board. The result ends with exactly one newline.
pub fn serialize_board(board: &Board) -> String {
    let mut out = String::new();

    if let Some(front_matter) = &board.front_matter {
        out.push_str(front_matter);
        if !front_matter.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }

    if !board.notes.is_empty() {
        for line in &board.notes {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    for (index, section) in board.sections.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        if section.header.is_empty() {
            out.push_str("##\n");
        } else {
            out.push_str("## ");
            out.push_str(&section.header);
            out.push('\n');
        }
        for line in &section.notes {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&serialize_items(section.items.iter().map(|item| item.as_ref())));
    }

    crate::ensure_single_trailing_newline(&out)
}
