//! Slide syntax: flat segments separated by a line holding only `---`.

/// Delimiter line between segments.
pub const SEGMENT_DELIMITER: &str = "---";

/// Separator written between segments when joining.
const JOIN_SEPARATOR: &str = "\n\n---\n\n";

/// Split slide text into segments.
///
/// A leading front-matter block is not treated specially here; callers strip
/// it first when they need to. Delimiters inside fenced code are ignored,
/// blank lines at segment edges are dropped, and blank segments vanish.
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        if !in_fence && line.trim_end() == SEGMENT_DELIMITER {
            push_segment(&mut segments, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_segment(&mut segments, &current);

    segments
}

fn push_segment(segments: &mut Vec<String>, lines: &[&str]) {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    if let (Some(start), Some(end)) = (start, end) {
        segments.push(lines[start..=end].join("\n"));
    }
}

/// Join segments into slide text ending with exactly one newline.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(|s| s.as_ref().trim_matches('\n'))
        .filter(|s| !s.trim().is_empty())
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    let mut out = parts.join(JOIN_SEPARATOR);
    out.push('\n');
    out
}
