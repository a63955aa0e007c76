//! Archive fetch and local staging.
//!
//! A snapshot of `owner/name@ref` is downloaded from the provider and written
//! to `{staging_root}/{name}/{name}.zip`. The `{staging_root}/{name}`
//! directory is what the sync step mirrors to object storage.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::contract::{RepositoryDescriptor, RepositoryProvider};
use crate::error::MirrorError;

/// A snapshot written to local staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArchive {
    /// Directory owned by this repository (the sync source).
    pub directory: PathBuf,
    /// The zip file inside `directory`.
    pub archive: PathBuf,
    pub size: u64,
}

/// Download the zip snapshot for `descriptor`.
pub async fn fetch_archive<P>(
    provider: &P,
    descriptor: &RepositoryDescriptor,
) -> Result<Vec<u8>, MirrorError>
where
    P: RepositoryProvider + ?Sized,
{
    descriptor.validate()?;

    debug!(repository = %descriptor, "[FETCH] Requesting archive");
    let bytes = provider
        .download_archive(&descriptor.owner, &descriptor.name, &descriptor.git_ref)
        .await
        .map_err(|source| {
            error!(repository = %descriptor, error = ?source, "[FETCH] Archive download failed");
            MirrorError::Fetch {
                repository: descriptor.to_string(),
                source,
            }
        })?;

    info!(repository = %descriptor, size = bytes.len(), "[FETCH] Archive downloaded");
    Ok(bytes)
}

/// `{staging_root}/{name}`.
pub fn staging_directory(staging_root: &Path, descriptor: &RepositoryDescriptor) -> PathBuf {
    staging_root.join(&descriptor.name)
}

/// `{staging_root}/{name}/{name}.zip`.
pub fn archive_path(staging_root: &Path, descriptor: &RepositoryDescriptor) -> PathBuf {
    staging_directory(staging_root, descriptor).join(format!("{}.zip", descriptor.name))
}

/// Write `bytes` to the repository's staging location, creating the
/// directory if absent. An existing archive is overwritten.
pub async fn stage_archive(
    staging_root: &Path,
    descriptor: &RepositoryDescriptor,
    bytes: &[u8],
) -> Result<StagedArchive, MirrorError> {
    descriptor.validate()?;
    let directory = staging_directory(staging_root, descriptor);
    let archive = archive_path(staging_root, descriptor);

    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|source| MirrorError::Staging {
            path: directory.clone(),
            source,
        })?;
    tokio::fs::write(&archive, bytes)
        .await
        .map_err(|source| MirrorError::Staging {
            path: archive.clone(),
            source,
        })?;

    info!(path = %archive.display(), size = bytes.len(), "[STAGE] Archive staged");
    Ok(StagedArchive {
        directory,
        archive,
        size: bytes.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_path_is_namespaced_by_repository() {
        let descriptor = RepositoryDescriptor::new("web", "acme", "refs/heads/main");
        assert_eq!(
            archive_path(Path::new("/tmp"), &descriptor),
            PathBuf::from("/tmp/web/web.zip")
        );
    }

    #[tokio::test]
    async fn staging_twice_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let descriptor = RepositoryDescriptor::new("web", "acme", "refs/heads/main");

        let first = stage_archive(root.path(), &descriptor, b"PK\x03\x04one").await.unwrap();
        let second = stage_archive(root.path(), &descriptor, b"PK\x03\x04two").await.unwrap();

        assert_eq!(first.archive, second.archive);
        assert_eq!(std::fs::read(&second.archive).unwrap(), b"PK\x03\x04two");
    }
}
