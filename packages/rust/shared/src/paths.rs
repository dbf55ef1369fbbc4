//! Path reference normalization.
//!
//! Every comparison between two path references in the pipeline goes through
//! [`paths_equal`] (or compares [`normalize_reference`] / [`resolve_reference`]
//! outputs). Nothing here touches the filesystem.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use tracing::warn;

/// Character that signals a percent-encoded reference.
const ENCODING_MARKER: char = '%';

/// A reference whose percent-encoding could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not decode path reference '{raw}'")]
pub struct PathDecodeError {
    /// The reference as written.
    pub raw: String,
}

/// Percent-decode `raw` if it contains an encoding marker.
///
/// Returns the input unchanged when there is nothing to decode. Decoding that
/// does not produce valid UTF-8 is an error; callers fall back to the raw
/// string (see [`decode_or_raw`]).
pub fn decode_reference(raw: &str) -> Result<Cow<'_, str>, PathDecodeError> {
    if !raw.contains(ENCODING_MARKER) {
        return Ok(Cow::Borrowed(raw));
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| PathDecodeError {
            raw: raw.to_string(),
        })
}

/// Decode `raw`, falling back to the raw text when decoding fails.
///
/// The second value is the decode failure, if any, so callers can report it.
pub fn decode_or_raw(raw: &str) -> (Cow<'_, str>, Option<PathDecodeError>) {
    match decode_reference(raw) {
        Ok(decoded) => (decoded, None),
        Err(err) => {
            warn!(reference = raw, "path decode failed, using raw reference");
            (Cow::Borrowed(raw), Some(err))
        }
    }
}

/// Canonical textual form of a reference.
///
/// Decoded, `/`-separated, `.` segments removed, inner `..` folded, and
/// relative references always prefixed with `./` (or `../`), so `a.md`,
/// `./a.md` and `./x/../a.md` all normalize to `./a.md`.
pub fn normalize_reference(raw: &str) -> String {
    let (decoded, _) = decode_or_raw(raw.trim());
    let unified = decoded.replace('\\', "/");

    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.starts_with("..") {
        joined
    } else if joined.is_empty() {
        "./".to_string()
    } else {
        format!("./{joined}")
    }
}

/// Whether two references name the same logical file.
pub fn paths_equal(a: &str, b: &str) -> bool {
    normalize_reference(a) == normalize_reference(b)
}

/// Resolve `reference` against `base_dir` into a lexically normalized path.
pub fn resolve_reference(base_dir: &Path, reference: &str) -> PathBuf {
    let (decoded, _) = decode_or_raw(reference.trim());
    let candidate = Path::new(decoded.as_ref());
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    lexical_normalize(&joined)
}

/// Fold `.` and `..` components without consulting the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Relative path from directory `from` to `to`, `/`-separated.
///
/// Both paths should be normalized and of the same kind (both absolute or
/// both relative to the same root).
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from = lexical_normalize(from);
    let to = lexical_normalize(to);
    let from_parts: Vec<Component<'_>> = from
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to_parts: Vec<Component<'_>> = to
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    segments.extend(std::iter::repeat_n("..".to_string(), from_parts.len() - common));
    segments.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

/// Whether a reference points at a remote or non-file location.
pub fn is_remote_reference(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    lower.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("mailto:")
        || lower.starts_with('#')
        || has_url_scheme(&lower)
}

/// `scheme://` with a scheme of two or more characters (so `C:/` is not one).
fn has_url_scheme(reference: &str) -> bool {
    reference.split_once("://").is_some_and(|(scheme, _)| {
        scheme.len() > 1
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
