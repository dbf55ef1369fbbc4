//! Report types: recoverable issues and output artifacts.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Kind of a recoverable problem found while processing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A reference could not be percent-decoded; the raw text was used.
    PathDecode,
    /// An include directive pointed back into its own include chain.
    CycleDetected,
    /// An include chain exceeded the maximum depth.
    DepthExceeded,
    /// An include target could not be read.
    MissingInclude,
    /// A referenced asset could not be read.
    AssetMissing,
    /// The requested scope does not exist.
    ScopeOutOfRange,
    /// Writing the output failed; the operation produced nothing.
    Write,
}

impl IssueKind {
    /// Whether issues of this kind land in `errors` rather than `warnings`.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Self::CycleDetected | Self::DepthExceeded | Self::ScopeOutOfRange | Self::Write
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PathDecode => "path-decode",
            Self::CycleDetected => "cycle-detected",
            Self::DepthExceeded => "depth-exceeded",
            Self::MissingInclude => "missing-include",
            Self::AssetMissing => "asset-missing",
            Self::ScopeOutOfRange => "scope-out-of-range",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// One entry of the structured report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// What went wrong.
    pub kind: IssueKind,
    /// The directive or asset reference that triggered it, as written.
    pub origin: String,
    /// File containing the origin, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Human-readable detail.
    pub message: String,
}

impl Issue {
    /// Build an issue.
    pub fn new(
        kind: IssueKind,
        origin: impl Into<String>,
        source: Option<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            origin: origin.into(),
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.origin, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (in {})", source.display())?;
        }
        Ok(())
    }
}

/// Accumulates issues for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLog {
    /// Recoverable problems.
    pub warnings: Vec<Issue>,
    /// Problems that cut off part of the output.
    pub errors: Vec<Issue>,
}

impl IssueLog {
    /// Record an issue in the list matching its kind.
    pub fn push(&mut self, issue: Issue) {
        if issue.kind.is_error() {
            tracing::warn!(kind = %issue.kind, origin = %issue.origin, "{}", issue.message);
            self.errors.push(issue);
        } else {
            tracing::debug!(kind = %issue.kind, origin = %issue.origin, "{}", issue.message);
            self.warnings.push(issue);
        }
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Role of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The exported document.
    Primary,
    /// An included file emitted on its own.
    Satellite,
    /// A copied binary asset.
    Asset,
}

/// Where an artifact's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    /// In-memory text.
    Text(String),
    /// Bytes copied from an existing file.
    CopyFrom(PathBuf),
}

/// One output file, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Role of the file.
    pub kind: ArtifactKind,
    /// Path under the output root, `/`-separated.
    pub relative_path: String,
    /// Content hash (SHA-256 hex) used for deduplication.
    pub content_hash: String,
    /// Source of the bytes.
    #[serde(skip)]
    pub payload: ArtifactPayload,
}

impl Artifact {
    /// Text artifact.
    pub fn text(
        kind: ArtifactKind,
        relative_path: impl Into<String>,
        content_hash: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            relative_path: relative_path.into(),
            content_hash: content_hash.into(),
            payload: ArtifactPayload::Text(text.into()),
        }
    }

    /// Text payload, if this artifact carries one.
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            ArtifactPayload::Text(text) => Some(text),
            ArtifactPayload::CopyFrom(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_route_by_kind() {
        let mut log = IssueLog::default();
        log.push(Issue::new(IssueKind::MissingInclude, "!!!include(x.md)!!!", None, "not found"));
        log.push(Issue::new(IssueKind::CycleDetected, "!!!include(a.md)!!!", None, "cycle"));
        assert_eq!(log.warnings.len(), 1);
        assert_eq!(log.errors.len(), 1);
        assert_eq!(log.errors[0].kind, IssueKind::CycleDetected);
    }

    #[test]
    fn issue_display() {
        let issue = Issue::new(
            IssueKind::AssetMissing,
            "img/logo.png",
            Some(PathBuf::from("/b/board.md")),
            "file not found",
        );
        assert_eq!(
            issue.to_string(),
            "[asset-missing] img/logo.png: file not found (in /b/board.md)"
        );
    }

    #[test]
    fn artifact_serializes_without_payload() {
        let artifact = Artifact::text(ArtifactKind::Primary, "board.md", "abc", "## Todo\n");
        let json = serde_json::to_value(&artifact).expect("serialize");
        assert_eq!(json["kind"], "primary");
        assert_eq!(json["relative_path"], "board.md");
        assert!(json.get("payload").is_none());
        assert_eq!(artifact.as_text(), Some("## Todo\n"));
    }
}
