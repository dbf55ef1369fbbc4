//! Include directive parsing.
//!
//! Three forms, each taking one path argument:
//!
//! - `!!!include(path)!!!` anywhere in text
//! - `!!!sectioninclude(path)!!!` on a `## ` header line
//! - `!!!iteminclude(path)!!!` on a `- [ ] ` item line
//!
//! Text is split into [`Piece`]s: literal runs and directives. A section or
//! item directive owns its whole line so the resolver can rebuild it.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use boardpress_shared::paths::{decode_or_raw, resolve_reference};
use boardpress_shared::tags;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!!!(include|sectioninclude|iteminclude)\(([^()\n]+)\)!!!").expect("valid regex")
});

static ITEM_LEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[([ xX])\] ?").expect("valid regex"));

/// Granularity of an include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    /// Opaque text spliced in place.
    Content,
    /// A whole section built from the target's items.
    Section,
    /// A single item built from the target's text.
    Item,
}

impl DirectiveKind {
    /// Keyword used in the marker.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Content => "include",
            Self::Section => "sectioninclude",
            Self::Item => "iteminclude",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "include" => Some(Self::Content),
            "sectioninclude" => Some(Self::Section),
            "iteminclude" => Some(Self::Item),
            _ => None,
        }
    }

    /// Render a marker for `argument`.
    pub fn marker(self, argument: &str) -> String {
        format!("!!!{}({argument})!!!", self.keyword())
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One include directive found in a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    /// Include granularity.
    pub kind: DirectiveKind,
    /// The argument as written.
    pub raw_argument: String,
    /// Argument resolved against the containing unit's directory.
    pub resolved_path: PathBuf,
    /// Line lead that belongs to the surface syntax (`## `, `- [ ] `).
    /// Empty for content includes.
    pub lead: String,
    /// Text between the lead and the marker.
    pub prefix: String,
    /// Text after the marker on the same line.
    pub suffix: String,
    /// Checkbox state of an item directive line.
    pub checked: bool,
    /// Whether the argument failed to percent-decode.
    #[serde(skip)]
    pub decode_failed: bool,
}

impl Directive {
    /// The marker exactly as written.
    pub fn marker(&self) -> String {
        self.kind.marker(&self.raw_argument)
    }

    /// Tags written around the marker.
    pub fn tags(&self) -> BTreeSet<String> {
        tags::tags_in(&format!("{} {}", self.prefix, self.suffix))
    }

    /// The directive's text rewritten to point at `argument`, keeping the
    /// surrounding line text byte for byte.
    pub fn rewritten(&self, argument: &str) -> String {
        format!(
            "{}{}{}{}",
            self.lead,
            self.prefix,
            self.kind.marker(argument),
            self.suffix
        )
    }

    /// The directive's text with the marker replaced by `replacement`.
    pub fn with_marker_replaced(&self, replacement: &str) -> String {
        format!("{}{}{}{}", self.lead, self.prefix, replacement, self.suffix)
    }

    /// File name of the resolved target.
    pub fn file_name(&self) -> String {
        self.resolved_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.raw_argument.clone())
    }
}

/// A run of text or a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Text copied through unchanged.
    Literal(String),
    /// A directive to resolve.
    Directive(Directive),
}

fn build(kind: DirectiveKind, argument: &str, base_dir: &Path) -> Directive {
    let argument = argument.trim();
    let (_, decode_error) = decode_or_raw(argument);
    Directive {
        kind,
        raw_argument: argument.to_string(),
        resolved_path: resolve_reference(base_dir, argument),
        lead: String::new(),
        prefix: String::new(),
        suffix: String::new(),
        checked: false,
        decode_failed: decode_error.is_some(),
    }
}

/// Split `text` into literal pieces and directives.
///
/// Concatenating the pieces (with each directive rendered by
/// [`Directive::rewritten`] using its own argument) reproduces `text`.
/// Markers inside fenced code, section markers off header lines, and item
/// markers off item lines stay literal.
pub fn parse_pieces(text: &str, base_dir: &Path) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();
    let mut literal = String::new();
    let mut in_fence = false;

    let flush = |literal: &mut String, pieces: &mut Vec<Piece>| {
        if !literal.is_empty() {
            pieces.push(Piece::Literal(std::mem::take(literal)));
        }
    };

    for raw_line in text.split_inclusive('\n') {
        let (line, newline) = match raw_line.strip_suffix('\n') {
            Some(line) => (line, "\n"),
            None => (raw_line, ""),
        };

        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if in_fence || !line.contains("!!!") {
            literal.push_str(raw_line);
            continue;
        }

        if let Some(directive) = line_directive(line, base_dir) {
            flush(&mut literal, &mut pieces);
            pieces.push(Piece::Directive(directive));
            literal.push_str(newline);
            continue;
        }

        let mut cursor = 0;
        for caps in DIRECTIVE_RE.captures_iter(line) {
            let Some(kind) = DirectiveKind::from_keyword(&caps[1]) else {
                continue;
            };
            if kind != DirectiveKind::Content {
                debug!(%kind, line, "directive outside its line form, kept as text");
                continue;
            }
            let Some(whole) = caps.get(0) else { continue };
            literal.push_str(&line[cursor..whole.start()]);
            flush(&mut literal, &mut pieces);

            // Surrounding text stays in the literal pieces.
            pieces.push(Piece::Directive(build(kind, &caps[2], base_dir)));
            cursor = whole.end();
        }
        literal.push_str(&line[cursor..]);
        literal.push_str(newline);
    }
    flush(&mut literal, &mut pieces);

    pieces
}

/// A section directive on a header line or an item directive on an item
/// line, owning the whole line.
fn line_directive(line: &str, base_dir: &Path) -> Option<Directive> {
    let caps = DIRECTIVE_RE.captures(line)?;
    let kind = DirectiveKind::from_keyword(&caps[1])?;
    let whole = caps.get(0)?;

    let (lead, checked) = match kind {
        DirectiveKind::Section => {
            if !line.starts_with("## ") {
                return None;
            }
            ("## ".to_string(), false)
        }
        DirectiveKind::Item => {
            let lead = ITEM_LEAD_RE.captures(line)?;
            let checked = !lead[1].trim().is_empty();
            (lead[0].to_string(), checked)
        }
        DirectiveKind::Content => return None,
    };
    if whole.start() < lead.len() {
        return None;
    }

    let mut directive = build(kind, &caps[2], base_dir);
    directive.prefix = line[lead.len()..whole.start()].to_string();
    directive.suffix = line[whole.end()..].to_string();
    directive.lead = lead;
    directive.checked = checked;
    Some(directive)
}

/// Every directive in `text`, in order.
pub fn scan_directives(text: &str, base_dir: &Path) -> Vec<Directive> {
    parse_pieces(text, base_dir)
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Directive(directive) => Some(directive),
            Piece::Literal(_) => None,
        })
        .collect()
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
