//! Hashtag helpers shared by the board model and the emitters.
//!
//! A tag is `#` followed by `[A-Za-z0-9_][A-Za-z0-9_-]*`, at the start of a
//! line or after whitespace. Layout tags (`#rowN`, `#stack`, `#span`,
//! `#spanN`) carry positional data; everything else is free-form.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::TagVisibility;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\s)#([A-Za-z0-9_][A-Za-z0-9_-]*)").expect("valid regex")
});

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^row(\d+)$").expect("valid regex"));

/// All tag names (without `#`) in `text`.
pub fn tags_in(text: &str) -> BTreeSet<String> {
    TAG_RE
        .captures_iter(text)
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Row number from a `#rowN` tag; untagged text sits in row 1.
pub fn row_of(text: &str) -> u32 {
    TAG_RE
        .captures_iter(text)
        .find_map(|caps| {
            ROW_RE
                .captures(&caps[2])
                .and_then(|row| row[1].parse::<u32>().ok())
        })
        .filter(|row| *row > 0)
        .unwrap_or(1)
}

/// Whether `text` carries the `#stack` tag.
pub fn is_stacked(text: &str) -> bool {
    TAG_RE
        .captures_iter(text)
        .any(|caps| caps[2].eq_ignore_ascii_case("stack"))
}

/// Whether a tag name is a layout tag.
pub fn is_layout_tag(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ROW_RE.is_match(&lower)
        || lower == "stack"
        || lower
            .strip_prefix("span")
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

/// Remove tags according to `visibility`.
///
/// Only lines that lose a tag are touched: spaces left behind collapse and
/// trailing whitespace on those lines is trimmed. Fenced code blocks are
/// left alone.
pub fn apply_visibility(text: &str, visibility: TagVisibility) -> String {
    if visibility == TagVisibility::All {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };

        if body.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if in_fence || !TAG_RE.is_match(body) {
            out.push_str(line);
            continue;
        }

        let mut removed = false;
        let stripped = TAG_RE.replace_all(body, |caps: &regex::Captures<'_>| {
            let hide = match visibility {
                TagVisibility::None => true,
                TagVisibility::HideLayout => is_layout_tag(&caps[2]),
                TagVisibility::All => false,
            };
            if hide {
                removed = true;
                caps[1].to_string()
            } else {
                caps[0].to_string()
            }
        });

        if removed {
            let indent = &body[..body.len() - body.trim_start().len()];
            out.push_str(indent);
            out.push_str(&collapse_spaces(stripped.trim_start()));
        } else {
            out.push_str(body);
        }
        out.push_str(newline);
    }

    out
}

/// Collapse runs of spaces and trim the end.
fn collapse_spaces(line: &str) -> String {
    let mut collapsed = String::with_capacity(line.len());
    let mut previous_space = false;
    for c in line.chars() {
        if c == ' ' {
            if !previous_space {
                collapsed.push(c);
            }
            previous_space = true;
        } else {
            collapsed.push(c);
            previous_space = false;
        }
    }
    collapsed.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tags() {
        let tags = tags_in("Review #row2 #urgent-fix and #stack");
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["row2", "stack", "urgent-fix"]
        );
    }

    #[test]
    fn ignores_fragments_and_headings() {
        assert!(tags_in("## Heading").is_empty());
        assert!(tags_in("see http://example.com/page#anchor").is_empty());
        assert!(tags_in("[link](notes.md#part)").is_empty());
    }

    #[test]
    fn row_defaults_to_one() {
        assert_eq!(row_of("Todo"), 1);
        assert_eq!(row_of("Todo #row3"), 3);
        assert_eq!(row_of("Todo #ROW2"), 2);
        assert_eq!(row_of("Todo #row0"), 1);
    }

    #[test]
    fn stack_flag() {
        assert!(is_stacked("Later #stack"));
        assert!(!is_stacked("Later #stacked"));
    }

    #[test]
    fn layout_tags() {
        assert!(is_layout_tag("row12"));
        assert!(is_layout_tag("stack"));
        assert!(is_layout_tag("span"));
        assert!(is_layout_tag("span2"));
        assert!(!is_layout_tag("spanish"));
        assert!(!is_layout_tag("urgent"));
    }

    #[test]
    fn visibility_all_is_identity() {
        let text = "## Todo #row2  \n- [ ] a #x\n";
        assert_eq!(apply_visibility(text, TagVisibility::All), text);
    }

    #[test]
    fn hide_layout_keeps_other_tags() {
        let text = "## Todo #row2 #stack #team\n- [ ] task #row9 text\n";
        assert_eq!(
            apply_visibility(text, TagVisibility::HideLayout),
            "## Todo #team\n- [ ] task text\n"
        );
    }

    #[test]
    fn hide_all_tags() {
        let text = "## Todo #row2 #team\n  body #note stays?\nno tags here  \n";
        assert_eq!(
            apply_visibility(text, TagVisibility::None),
            "## Todo\n  body stays?\nno tags here  \n"
        );
    }

    #[test]
    fn fenced_code_untouched() {
        let text = "```\n#include <stdio.h> #keep\n```\n#drop me\n";
        assert_eq!(
            apply_visibility(text, TagVisibility::None),
            "```\n#include <stdio.h> #keep\n```\nme\n"
        );
    }
}
