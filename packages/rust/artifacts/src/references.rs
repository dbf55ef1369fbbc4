//! File reference scanning and rewriting.
//!
//! Recognizes markdown images (`![alt](path)`), markdown links
//! (`[text](path)`) and raw media tags (`<img src="path">`, also `video`,
//! `audio`, `source`). Remote and anchor references are skipped, and so is
//! anything inside fenced code.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use boardpress_shared::paths::{is_remote_reference, relative_path, resolve_reference};

static MARKDOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[[^\]\n]*\]\(\s*(<[^>\n]+>|[^)\s]+)(?:\s+"[^"\n]*")?\s*\)"#)
        .expect("valid regex")
});

static MEDIA_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<(?:img|video|audio|source)\b[^>]*?\bsrc\s*=\s*["']([^"'\n]+)["']"#)
        .expect("valid regex")
});

/// Syntax a reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `![alt](path)`
    Image,
    /// `[text](path)`
    Link,
    /// `<img src="path">` and friends.
    MediaTag,
}

/// One local file reference found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// How it was written.
    pub kind: ReferenceKind,
    /// Target as written (angle brackets removed).
    pub raw: String,
    /// Byte range of `raw` inside the scanned text.
    pub span: Range<usize>,
}

impl Reference {
    /// The path part of the target, without `#fragment` or `?query`.
    pub fn path_part(&self) -> &str {
        let end = self.raw.find(['#', '?']).unwrap_or(self.raw.len());
        &self.raw[..end]
    }

    /// The `#fragment` / `?query` suffix, if any.
    pub fn suffix(&self) -> &str {
        &self.raw[self.path_part().len()..]
    }
}

/// Byte ranges covered by fenced code blocks.
fn fenced_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut offset = 0;
    let mut open: Option<usize> = None;

    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match open.take() {
                Some(start) => ranges.push(start..offset + line.len()),
                None => open = Some(offset),
            }
        }
        offset += line.len();
    }
    if let Some(start) = open {
        ranges.push(start..text.len());
    }
    ranges
}

/// Scan `text` for local file references, in order of appearance.
pub fn scan_references(text: &str) -> Vec<Reference> {
    let fenced = fenced_ranges(text);
    let in_fence = |pos: usize| fenced.iter().any(|r| r.contains(&pos));

    let mut found = Vec::new();

    for caps in MARKDOWN_RE.captures_iter(text) {
        let Some(target) = caps.get(2) else { continue };
        if in_fence(target.start()) {
            continue;
        }
        let kind = if caps[1].is_empty() {
            ReferenceKind::Link
        } else {
            ReferenceKind::Image
        };
        let (raw, span) = match target.as_str().strip_prefix('<') {
            Some(inner) => {
                let inner = inner.strip_suffix('>').unwrap_or(inner);
                (inner, target.start() + 1..target.start() + 1 + inner.len())
            }
            None => (target.as_str(), target.range()),
        };
        found.push(Reference {
            kind,
            raw: raw.to_string(),
            span,
        });
    }

    for caps in MEDIA_TAG_RE.captures_iter(text) {
        let Some(target) = caps.get(1) else { continue };
        if in_fence(target.start()) {
            continue;
        }
        found.push(Reference {
            kind: ReferenceKind::MediaTag,
            raw: target.as_str().to_string(),
            span: target.range(),
        });
    }

    found.retain(|r| !r.raw.trim().is_empty() && !is_remote_reference(&r.raw));
    found.sort_by_key(|r| r.span.start);

    // A target nested inside another (a markdown image written into a tag's
    // `src`) belongs to the outer reference.
    let mut end = 0;
    found.retain(|r| {
        let keep = r.span.start >= end;
        if keep {
            end = r.span.end;
        }
        keep
    });
    found
}

/// Replace reference targets for which `replace` returns a value.
pub fn rewrite_references<F>(text: &str, mut replace: F) -> String
where
    F: FnMut(&Reference) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for reference in scan_references(text) {
        if let Some(replacement) = replace(&reference) {
            out.push_str(&text[cursor..reference.span.start]);
            out.push_str(&replacement);
            cursor = reference.span.end;
        }
    }
    out.push_str(&text[cursor..]);
    out
}

/// Rewrite relative references in text moved from `from_dir` to `to_dir`
/// so they keep pointing at the same files.
///
/// Absolute, remote and anchor-only references are left alone.
pub fn rebase_references(text: &str, from_dir: &Path, to_dir: &Path) -> String {
    if from_dir == to_dir {
        return text.to_string();
    }
    rewrite_references(text, |reference| {
        let path = reference.path_part();
        if path.is_empty() || path.starts_with('/') || Path::new(path).is_absolute() {
            return None;
        }
        let target = resolve_reference(from_dir, path);
        let mut rebased = relative_path(to_dir, &target);
        if rebased.contains(' ') {
            rebased = rebased.replace(' ', "%20");
        }
        rebased.push_str(reference.suffix());
        (rebased != reference.raw).then_some(rebased)
    })
}
