//! Artifact set assembly.
//!
//! Takes the finished primary unit, its satellites and the asset artifacts
//! and produces the ordered list the writer puts on disk: primary first,
//! then satellites in discovery order, then assets.

use std::collections::HashSet;
use std::path::{Component, Path};

use tracing::{debug, info, instrument};

use boardpress_artifacts::text_hash;
use boardpress_shared::{Artifact, ArtifactKind, BoardpressError, Result};

use crate::include::ResolvedUnit;

/// Build the artifact list for one invocation.
///
/// Text artifacts are hashed over their final text. Fails with a validation
/// error if two artifacts share a path or a path would leave the output root.
#[instrument(skip_all, fields(satellites = satellites.len(), assets = assets.len()))]
pub fn assemble(
    primary: &ResolvedUnit,
    satellites: &[ResolvedUnit],
    assets: Vec<Artifact>,
) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::with_capacity(1 + satellites.len() + assets.len());

    artifacts.push(text_artifact(ArtifactKind::Primary, primary));
    artifacts.extend(
        satellites
            .iter()
            .map(|unit| text_artifact(ArtifactKind::Satellite, unit)),
    );
    artifacts.extend(assets);

    validate_paths(&artifacts)?;

    info!(count = artifacts.len(), "artifact set assembled");
    Ok(artifacts)
}

fn text_artifact(kind: ArtifactKind, unit: &ResolvedUnit) -> Artifact {
    let hash = text_hash(&unit.unit.text);
    debug!(?kind, path = %unit.relative_path, hash = %&hash[..12], "text artifact");
    Artifact::text(kind, &unit.relative_path, hash, unit.unit.text.clone())
}

/// Check that every artifact path is relative, stays inside the output root
/// and is used once.
pub fn validate_paths(artifacts: &[Artifact]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = artifact.relative_path.as_str();
        if path.is_empty() {
            return Err(BoardpressError::validation("artifact with an empty path"));
        }
        let escapes = Path::new(path).components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(BoardpressError::validation(format!(
                "artifact path '{path}' leaves the output root"
            )));
        }
        if !seen.insert(path) {
            return Err(BoardpressError::validation(format!(
                "two artifacts share the path '{path}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use boardpress_shared::{ArtifactPayload, ContentUnit, SurfaceFormat, UnitLevel};

    fn unit(path: &str, text: &str) -> ResolvedUnit {
        ResolvedUnit {
            unit: ContentUnit::new(None, SurfaceFormat::Board, UnitLevel::Document, text),
            base_dir: PathBuf::from("."),
            relative_path: path.to_string(),
        }
    }

    #[test]
    fn orders_primary_satellites_assets() {
        let asset = Artifact {
            kind: ArtifactKind::Asset,
            relative_path: "assets/a.png".into(),
            content_hash: "abc".into(),
            payload: ArtifactPayload::CopyFrom(PathBuf::from("/src/a.png")),
        };
        let artifacts = assemble(
            &unit("board.md", "## A\n"),
            &[unit("todo.md", "- [ ] x\n")],
            vec![asset],
        )
        .unwrap();

        let kinds: Vec<ArtifactKind> = artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ArtifactKind::Primary, ArtifactKind::Satellite, ArtifactKind::Asset]
        );
        assert_eq!(artifacts[0].content_hash, text_hash("## A\n"));
        assert_eq!(artifacts[1].as_text(), Some("- [ ] x\n"));
    }

    #[test]
    fn rejects_duplicate_paths() {
        let err = assemble(&unit("board.md", "a"), &[unit("board.md", "b")], Vec::new());
        assert!(matches!(err, Err(BoardpressError::Validation { .. })));
    }

    #[test]
    fn rejects_escaping_paths() {
        for path in ["../out.md", "/abs.md", "a/../../b.md", ""] {
            assert!(assemble(&unit(path, "x"), &[], Vec::new()).is_err(), "{path}");
        }
    }
}
