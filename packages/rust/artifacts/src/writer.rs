//! Staged, all-or-nothing artifact writer.
//!
//! Every artifact is first written under a hidden staging directory inside
//! the output root, then renamed into place. If staging fails the staging
//! directory is removed and the output root is left as it was.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use boardpress_shared::{Artifact, ArtifactPayload, BoardpressError, Result};

/// Prefix of the per-invocation staging directory.
pub const STAGING_PREFIX: &str = ".boardpress-staging-";

/// Write `artifacts` under `output_root`.
///
/// `on_written` is called with each artifact's relative path once it is in
/// place. Cancellation is checked before every artifact; a cancelled write
/// removes the staging directory and returns [`BoardpressError::Cancelled`].
#[instrument(skip_all, fields(root = %output_root.display(), artifacts = artifacts.len()))]
pub async fn write_artifacts<F>(
    output_root: &Path,
    artifacts: &[Artifact],
    cancel: &CancellationToken,
    mut on_written: F,
) -> Result<Vec<PathBuf>>
where
    F: FnMut(&str),
{
    let staging = output_root.join(format!("{STAGING_PREFIX}{}", Uuid::now_v7()));
    tokio::fs::create_dir_all(&staging)
        .await
        .map_err(|e| BoardpressError::write(&staging, e))?;

    let staged = stage_all(&staging, artifacts, cancel).await;
    if let Err(e) = staged {
        discard(&staging).await;
        return Err(e);
    }

    // Every destination directory exists before the first rename.
    for artifact in artifacts {
        let to = output_root.join(&artifact.relative_path);
        if let Some(parent) = to.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                discard(&staging).await;
                return Err(BoardpressError::write(parent, e));
            }
        }
    }

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let from = staging.join(&artifact.relative_path);
        let to = output_root.join(&artifact.relative_path);
        if let Err(e) = tokio::fs::rename(&from, &to).await {
            discard(&staging).await;
            return Err(BoardpressError::write(&to, e));
        }
        debug!(path = %artifact.relative_path, "artifact in place");
        on_written(&artifact.relative_path);
        written.push(to);
    }

    discard(&staging).await;
    info!(count = written.len(), "artifacts written");
    Ok(written)
}

async fn stage_all(
    staging: &Path,
    artifacts: &[Artifact],
    cancel: &CancellationToken,
) -> Result<()> {
    for artifact in artifacts {
        if cancel.is_cancelled() {
            return Err(BoardpressError::Cancelled);
        }

        let target = staging.join(&artifact.relative_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BoardpressError::write(parent, e))?;
        }

        match &artifact.payload {
            ArtifactPayload::Text(text) => tokio::fs::write(&target, text)
                .await
                .map_err(|e| BoardpressError::write(&target, e))?,
            ArtifactPayload::CopyFrom(source) => {
                tokio::fs::copy(source, &target)
                    .await
                    .map_err(|e| BoardpressError::write(&target, e))?;
            }
        }
    }
    Ok(())
}

async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(staging).await {
        warn!(path = %staging.display(), error = %e, "failed to remove staging directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardpress_shared::ArtifactKind;

    fn staging_dirs(root: &Path) -> Vec<String> {
        std::fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect()
    }

    #[tokio::test]
    async fn writes_text_and_copies() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("logo.png");
        std::fs::write(&source, b"png").unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let artifacts = vec![
            Artifact::text(ArtifactKind::Primary, "board.md", "h1", "## A\n"),
            Artifact {
                kind: ArtifactKind::Asset,
                relative_path: "assets/logo.png".into(),
                content_hash: "h2".into(),
                payload: ArtifactPayload::CopyFrom(source),
            },
        ];

        let mut seen = Vec::new();
        let written = write_artifacts(&out, &artifacts, &CancellationToken::new(), |p| {
            seen.push(p.to_string())
        })
        .await
        .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(seen, vec!["board.md", "assets/logo.png"]);
        assert_eq!(std::fs::read_to_string(out.join("board.md")).unwrap(), "## A\n");
        assert_eq!(std::fs::read(out.join("assets/logo.png")).unwrap(), b"png");
        assert!(staging_dirs(&out).is_empty());
    }

    #[tokio::test]
    async fn failed_stage_leaves_root_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let artifacts = vec![
            Artifact::text(ArtifactKind::Primary, "board.md", "h1", "## A\n"),
            Artifact {
                kind: ArtifactKind::Asset,
                relative_path: "assets/missing.png".into(),
                content_hash: "h2".into(),
                payload: ArtifactPayload::CopyFrom(dir.path().join("nope.png")),
            },
        ];

        let err = write_artifacts(&out, &artifacts, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, BoardpressError::Write { .. }));
        assert!(!out.join("board.md").exists());
        assert!(staging_dirs(&out).is_empty());
    }

    #[tokio::test]
    async fn blocked_destination_moves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("assets"), "not a directory").unwrap();

        let artifacts = vec![
            Artifact::text(ArtifactKind::Primary, "board.md", "h1", "## A\n"),
            Artifact::text(ArtifactKind::Satellite, "assets/x.md", "h2", "x\n"),
        ];
        let err = write_artifacts(&out, &artifacts, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, BoardpressError::Write { .. }));
        assert!(!out.join("board.md").exists());
        assert!(staging_dirs(&out).is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let artifacts = vec![Artifact::text(ArtifactKind::Primary, "board.md", "h", "x\n")];
        let err = write_artifacts(dir.path(), &artifacts, &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, BoardpressError::Cancelled));
        assert!(!dir.path().join("board.md").exists());
        assert!(staging_dirs(dir.path()).is_empty());
    }
}
