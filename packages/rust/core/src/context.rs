//! Call-scoped state for one pipeline invocation.
//!
//! Everything that must be shared across recursive resolution (dedup map,
//! issue log, read cache, cancellation) lives here and is passed by
//! parameter. Nothing outlives the call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use boardpress_artifacts::DedupMap;
use boardpress_shared::paths::lexical_normalize;
use boardpress_shared::{BoardpressError, Issue, IssueLog, PipelineConfig, Result};

/// Mutable state threaded through one invocation.
#[derive(Debug)]
pub struct PipelineContext {
    /// Runtime limits.
    pub config: PipelineConfig,
    /// Shared satellite/asset name table.
    pub dedup: DedupMap,
    /// Accumulated warnings and errors.
    pub issues: IssueLog,
    cancel: CancellationToken,
    sources: HashMap<PathBuf, std::result::Result<Arc<str>, String>>,
}

impl PipelineContext {
    /// Fresh context.
    pub fn new(config: PipelineConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            dedup: DedupMap::new(),
            issues: IssueLog::default(),
            cancel,
            sources: HashMap::new(),
        }
    }

    /// The invocation's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with [`BoardpressError::Cancelled`] once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BoardpressError::Cancelled);
        }
        Ok(())
    }

    /// Record an issue.
    pub fn report(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Read a source file once per invocation. Failures are cached too.
    pub async fn read_source(&mut self, path: &Path) -> std::result::Result<Arc<str>, String> {
        let key = lexical_normalize(path);
        if let Some(cached) = self.sources.get(&key) {
            return cached.clone();
        }

        let loaded = match tokio::fs::read_to_string(&key).await {
            Ok(text) => Ok(Arc::<str>::from(text)),
            Err(e) => Err(e.to_string()),
        };
        debug!(path = %key.display(), ok = loaded.is_ok(), "read include source");
        self.sources.insert(key, loaded.clone());
        loaded
    }
}

/// Whether two resolved paths name the same file.
///
/// Both are already decoded, so only `.` and `..` are folded.
pub fn same_file(a: &Path, b: &Path) -> bool {
    lexical_normalize(a) == lexical_normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn caches_reads_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "first").unwrap();

        let mut ctx = PipelineContext::new(PipelineConfig::default(), CancellationToken::new());
        assert_eq!(&*ctx.read_source(&path).await.unwrap(), "first");

        std::fs::write(&path, "second").unwrap();
        let dotted = dir.path().join("./a.md");
        assert_eq!(&*ctx.read_source(&dotted).await.unwrap(), "first");

        assert!(ctx.read_source(&dir.path().join("missing.md")).await.is_err());
    }

    #[test]
    fn cancellation_check() {
        let token = CancellationToken::new();
        let ctx = PipelineContext::new(PipelineConfig::default(), token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(BoardpressError::Cancelled)));
    }

    #[test]
    fn same_file_ignores_spelling() {
        assert!(same_file(Path::new("/b/./a.md"), Path::new("/b/x/../a.md")));
        assert!(!same_file(Path::new("/b/a.md"), Path::new("/b/c.md")));
    }

    #[test]
    fn same_file_keeps_literal_percent_names() {
        assert!(!same_file(Path::new("/b/a%20b.md"), Path::new("/b/a b.md")));
        assert!(same_file(Path::new("/b/a%20b.md"), Path::new("/b/./a%20b.md")));
    }
}
