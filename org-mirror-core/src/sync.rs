//! Differential sync of a local directory into object storage.
//!
//! Every local file maps to `{prefix}/{relative path}`. A file is skipped
//! when the remote object has the same size and the same SHA-256 digest in
//! its metadata, so re-running a sync over unchanged content transfers
//! nothing. Remote objects without a local counterpart are left alone.
//!
//! Files larger than the multipart threshold go through
//! [`ObjectStore::put_object_multipart`] with the threshold as part size.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::contract::{ObjectStore, ObjectUpload};
use crate::error::MirrorError;

/// Objects above this size (100 MiB) are uploaded in parts of this size.
pub const MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Content type set on every uploaded archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Metadata key holding the object's SHA-256 hex digest.
pub const SHA256_METADATA_KEY: &str = "sha256";

/// A bucket plus key prefix, written `bucket/prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub prefix: String,
}

impl ObjectLocation {
    /// Parse `bucket`, `bucket/prefix` or `s3://bucket/prefix`.
    pub fn parse(location: &str) -> Result<Self, MirrorError> {
        let trimmed = location.trim();
        let trimmed = trimmed.strip_prefix("s3://").unwrap_or(trimmed);
        let (bucket, prefix) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        if bucket.is_empty() {
            return Err(MirrorError::InvalidArgument(format!(
                "destination `{location}` names no bucket"
            )));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    pub fn key_for(&self, relative: &str) -> String {
        if self.prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.prefix, relative)
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            f.write_str(&self.bucket)
        } else {
            write!(f, "{}/{}", self.bucket, self.prefix)
        }
    }
}

/// Snapshot of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub bytes_total: u64,
    pub objects_transferred: usize,
    pub objects_total: usize,
}

/// Receives [`TransferProgress`] events while a sync runs.
#[derive(Clone)]
pub struct TransferMonitor {
    sink: Arc<dyn Fn(&TransferProgress) + Send + Sync>,
}

impl TransferMonitor {
    pub fn new(sink: impl Fn(&TransferProgress) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Logs every event at info level.
    pub fn logging() -> Self {
        Self::new(|progress| {
            info!(
                bytes = progress.bytes_transferred,
                bytes_total = progress.bytes_total,
                objects = progress.objects_transferred,
                objects_total = progress.objects_total,
                "[SYNC] Transfer progress"
            )
        })
    }

    fn emit(&self, progress: &TransferProgress) {
        (self.sink)(progress)
    }
}

impl Default for TransferMonitor {
    fn default() -> Self {
        Self::logging()
    }
}

impl fmt::Debug for TransferMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferMonitor").finish_non_exhaustive()
    }
}

/// Upload tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub multipart_threshold: u64,
    pub content_type: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            multipart_threshold: MULTIPART_THRESHOLD,
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
        }
    }
}

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Keys written during this sync.
    pub uploaded: Vec<String>,
    /// Keys whose remote content already matched.
    pub skipped: Vec<String>,
    pub bytes_transferred: u64,
}

#[derive(Debug)]
struct LocalFile {
    path: PathBuf,
    relative: String,
    size: u64,
    sha256: String,
}

/// Mirror every file under `source` to `destination`.
pub async fn sync_directory<O>(
    store: &O,
    source: &Path,
    destination: &ObjectLocation,
    options: &SyncOptions,
    monitor: &TransferMonitor,
) -> Result<SyncReport, MirrorError>
where
    O: ObjectStore + ?Sized,
{
    if source.as_os_str().is_empty() {
        return Err(MirrorError::InvalidArgument(
            "sync source directory is required".to_string(),
        ));
    }
    if destination.bucket.trim().is_empty() {
        return Err(MirrorError::InvalidArgument(
            "sync destination bucket is required".to_string(),
        ));
    }
    if options.multipart_threshold == 0 {
        return Err(MirrorError::InvalidArgument(
            "multipart threshold must be positive".to_string(),
        ));
    }
    if !source.is_dir() {
        return Err(MirrorError::InvalidArgument(format!(
            "sync source `{}` is not a directory",
            source.display()
        )));
    }

    let root = source.to_path_buf();
    let local_files = tokio::task::spawn_blocking(move || scan_directory(&root))
        .await
        .map_err(|e| MirrorError::Sync {
            key: destination.to_string(),
            source: Box::new(e),
        })?
        .map_err(|e| MirrorError::Sync {
            key: destination.to_string(),
            source: Box::new(e),
        })?;
    debug!(source = %source.display(), files = local_files.len(), "[SYNC] Scanned local directory");

    let mut report = SyncReport::default();
    let mut pending = Vec::new();
    for file in local_files {
        let key = destination.key_for(&file.relative);
        let remote = store
            .head_object(&destination.bucket, &key)
            .await
            .map_err(|source| sync_error(&key, source))?;
        let unchanged = remote.is_some_and(|remote| {
            remote.size == file.size && remote.sha256.as_deref() == Some(file.sha256.as_str())
        });
        if unchanged {
            debug!(key = %key, "[SYNC] Remote object unchanged, skipping");
            report.skipped.push(key);
        } else {
            pending.push(ObjectUpload {
                bucket: destination.bucket.clone(),
                key,
                source: file.path,
                size: file.size,
                content_type: options.content_type.clone(),
                sha256: file.sha256,
            });
        }
    }

    let mut progress = TransferProgress {
        bytes_transferred: 0,
        bytes_total: pending.iter().map(|u| u.size).sum(),
        objects_transferred: 0,
        objects_total: pending.len(),
    };
    monitor.emit(&progress);

    for upload in pending {
        let result = if upload.size > options.multipart_threshold {
            debug!(key = %upload.key, size = upload.size, "[SYNC] Multipart upload");
            store
                .put_object_multipart(&upload, options.multipart_threshold)
                .await
        } else {
            store.put_object(&upload).await
        };
        result.map_err(|source| sync_error(&upload.key, source))?;

        progress.bytes_transferred += upload.size;
        progress.objects_transferred += 1;
        monitor.emit(&progress);
        report.bytes_transferred += upload.size;
        report.uploaded.push(upload.key);
    }

    info!(
        destination = %destination,
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        bytes = report.bytes_transferred,
        "[SYNC] Sync done"
    );
    Ok(report)
}

fn sync_error(key: &str, source: crate::contract::BoxError) -> MirrorError {
    error!(key, error = ?source, "[SYNC] Transfer failed");
    MirrorError::Sync {
        key: key.to_string(),
        source,
    }
}

fn scan_directory(root: &Path) -> io::Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let size = entry.metadata()?.len();
        let sha256 = sha256_file(entry.path())?;
        files.push(LocalFile {
            path: entry.into_path(),
            relative,
            size,
            sha256,
        });
    }
    Ok(files)
}

/// SHA-256 of a file's content, lowercase hex.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
