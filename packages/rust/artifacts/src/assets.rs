//! Binary asset discovery, hashing and relocation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use boardpress_shared::paths::{decode_or_raw, lexical_normalize, resolve_reference};
use boardpress_shared::{
    Artifact, ArtifactKind, ArtifactPayload, AssetStrategy, BoardpressError, Issue, IssueKind,
    PipelineConfig, Result,
};

use crate::dedup::DedupMap;
use crate::references::{Reference, rewrite_references, scan_references};

/// Directory (under the output root) copied assets land in.
pub const ASSET_DIR: &str = "assets";

/// Extensions treated as binary assets. Everything else is a document link.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "ico", "tif", "tiff", "avif", "heic",
    // audio
    "mp3", "wav", "ogg", "oga", "m4a", "flac", "aac", "opus",
    // video
    "mp4", "m4v", "webm", "mov", "mkv", "avi", "ogv",
    // documents and archives
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "zip", "epub",
];

/// Whether a reference path names a binary asset, judged by extension.
pub fn is_binary_reference(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One binary reference and what happens to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Reference as written in the text.
    pub original_reference: String,
    /// Resolved, lexically normalized source path.
    pub absolute_path: PathBuf,
    /// Windowed SHA-256, once hashed. `None` when the file is missing.
    pub content_hash: Option<String>,
    /// File size in bytes, once read.
    pub size: Option<u64>,
    /// Strategy applied to this record.
    pub strategy: AssetStrategy,
    /// Path under the output root, when the asset was copied.
    pub output_relative_path: Option<String>,
    /// Inline `data:` URI, when the asset was embedded.
    pub data_uri: Option<String>,
    /// File whose text contains the reference.
    pub source: Option<PathBuf>,
}

impl AssetRecord {
    /// Replacement text for the reference, if it changes.
    pub fn replacement(&self) -> Option<&str> {
        self.data_uri
            .as_deref()
            .or(self.output_relative_path.as_deref())
    }
}

/// Result of processing a batch of records.
#[derive(Debug, Default)]
pub struct ProcessedAssets {
    /// Records with hashes and outputs filled in, in input order.
    pub records: Vec<AssetRecord>,
    /// Asset files to emit.
    pub artifacts: Vec<Artifact>,
    /// Missing-file warnings.
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone)]
struct FileDigest {
    hash: String,
    size: u64,
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Finds binary references in text and relocates the files they point at.
#[derive(Debug, Clone)]
pub struct AssetCollector {
    hash_window_bytes: u64,
    embed_max_bytes: u64,
    concurrency: usize,
}

impl AssetCollector {
    /// Collector with limits taken from the runtime config.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            hash_window_bytes: config.hash_window_bytes.max(1),
            embed_max_bytes: config.embed_max_bytes,
            concurrency: config.hash_concurrency.max(1),
        }
    }

    /// Discover binary references in `text`, resolved against `base_dir`.
    ///
    /// Nothing is read from disk. Undecodable references are kept raw and
    /// reported.
    pub fn collect(
        &self,
        text: &str,
        base_dir: &Path,
        source: Option<&Path>,
        strategy: AssetStrategy,
    ) -> (Vec<AssetRecord>, Vec<Issue>) {
        if strategy == AssetStrategy::Ignore {
            return (Vec::new(), Vec::new());
        }

        let mut records = Vec::new();
        let mut issues = Vec::new();

        for reference in scan_references(text) {
            let path = reference.path_part();
            if !is_binary_reference(path) {
                continue;
            }
            if let (_, Some(err)) = decode_or_raw(path) {
                issues.push(Issue::new(
                    IssueKind::PathDecode,
                    &reference.raw,
                    source.map(Path::to_path_buf),
                    err.to_string(),
                ));
            }
            records.push(AssetRecord {
                original_reference: reference.raw.clone(),
                absolute_path: resolve_reference(base_dir, path),
                content_hash: None,
                size: None,
                strategy,
                output_relative_path: None,
                data_uri: None,
                source: source.map(Path::to_path_buf),
            });
        }

        debug!(count = records.len(), base = %base_dir.display(), "collected asset references");
        (records, issues)
    }

    /// Hash every record's file and apply `strategy`.
    ///
    /// Each distinct file is read once. Identical content (by hash) is emitted
    /// once through `dedup`. Missing files become warnings and leave their
    /// references untouched.
    #[instrument(skip_all, fields(records = records.len(), ?strategy))]
    pub async fn process(
        &self,
        records: Vec<AssetRecord>,
        strategy: AssetStrategy,
        dedup: &mut DedupMap,
        cancel: &CancellationToken,
    ) -> Result<ProcessedAssets> {
        if strategy == AssetStrategy::Ignore || records.is_empty() {
            return Ok(ProcessedAssets {
                records,
                ..ProcessedAssets::default()
            });
        }

        let digests = self.hash_all(&records, cancel).await?;

        let mut out = ProcessedAssets::default();
        let mut embedded: HashMap<PathBuf, String> = HashMap::new();

        for mut record in records {
            let Some(digest) = digests.get(&record.absolute_path).cloned().flatten() else {
                out.issues.push(Issue::new(
                    IssueKind::AssetMissing,
                    &record.original_reference,
                    record.source.clone(),
                    format!("file not found: {}", record.absolute_path.display()),
                ));
                out.records.push(record);
                continue;
            };
            record.content_hash = Some(digest.hash.clone());
            record.size = Some(digest.size);
            record.strategy = strategy;

            match strategy {
                AssetStrategy::Embed if digest.size <= self.embed_max_bytes => {
                    let uri = match embedded.get(&record.absolute_path) {
                        Some(uri) => uri.clone(),
                        None => {
                            let uri = data_uri(&record.absolute_path).await?;
                            embedded.insert(record.absolute_path.clone(), uri.clone());
                            uri
                        }
                    };
                    record.data_uri = Some(uri);
                }
                AssetStrategy::Embed | AssetStrategy::Copy => {
                    let desired = format!("{ASSET_DIR}/{}", file_name(&record.absolute_path));
                    let claim = dedup.claim(&digest.hash, &desired);
                    if claim.is_new() {
                        out.artifacts.push(Artifact {
                            kind: ArtifactKind::Asset,
                            relative_path: claim.path().to_string(),
                            content_hash: digest.hash.clone(),
                            payload: ArtifactPayload::CopyFrom(record.absolute_path.clone()),
                        });
                    }
                    record.output_relative_path = Some(claim.path().to_string());
                }
                AssetStrategy::Reference | AssetStrategy::Ignore => {}
            }
            out.records.push(record);
        }

        info!(
            assets = out.artifacts.len(),
            missing = out.issues.len(),
            "asset processing complete"
        );
        Ok(out)
    }

    /// Hash each distinct path concurrently, bounded by the semaphore.
    async fn hash_all(
        &self,
        records: &[AssetRecord],
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<PathBuf, Option<FileDigest>>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::new();
        let mut digests = BTreeMap::new();

        for record in records {
            let path = lexical_normalize(&record.absolute_path);
            if digests.contains_key(&path) {
                continue;
            }
            digests.insert(path.clone(), None);

            let sem = semaphore.clone();
            let window = self.hash_window_bytes;
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                match hash_file(&path, window).await {
                    Ok(digest) => Some((path, digest)),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "asset not readable");
                        None
                    }
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Some((path, digest))) => {
                    digests.insert(path, Some(digest));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "asset hashing task failed"),
            }
        }

        if cancel.is_cancelled() {
            return Err(BoardpressError::Cancelled);
        }
        Ok(digests)
    }
}

/// Rewrite references in `text` according to processed records.
///
/// Only references that resolve (from `base_dir`) to a record with a
/// replacement are touched.
pub fn apply_records(text: &str, base_dir: &Path, records: &[AssetRecord]) -> String {
    let replacements: HashMap<(PathBuf, String), &str> = records
        .iter()
        .filter_map(|record| {
            record.replacement().map(|replacement| {
                (
                    (record.absolute_path.clone(), record.original_reference.clone()),
                    replacement,
                )
            })
        })
        .collect();
    if replacements.is_empty() {
        return text.to_string();
    }

    rewrite_references(text, |reference: &Reference| {
        let path = resolve_reference(base_dir, reference.path_part());
        replacements
            .get(&(path, reference.raw.clone()))
            .map(|replacement| (*replacement).to_string())
    })
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// SHA-256 over the first `window` bytes; files larger than the window also
/// mix in their length.
async fn hash_file(path: &Path, window: u64) -> std::io::Result<FileDigest> {
    let file = tokio::fs::File::open(path).await?;
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(std::io::Error::other("not a regular file"));
    }
    let size = metadata.len();

    let mut buf = Vec::with_capacity(size.min(window) as usize);
    file.take(window).read_to_end(&mut buf).await?;

    let mut hasher = Sha256::new();
    hasher.update(&buf);
    if size > window {
        hasher.update(size.to_le_bytes());
    }
    Ok(FileDigest {
        hash: format!("{:x}", hasher.finalize()),
        size,
    })
}

async fn data_uri(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BoardpressError::io(path, e))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(format!(
        "data:{};base64,{}",
        mime.essence_str(),
        BASE64_STANDARD.encode(&bytes)
    ))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string())
}
