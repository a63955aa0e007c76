//! # contract: collaborator interfaces and the data that flows between them
//!
//! The pipeline talks to four external systems: the source-control provider,
//! the work queue, object storage and the error log store. Each is a trait
//! here so the orchestrators can be constructed with real clients (see the
//! `org-mirror` crate) or with `mockall` mocks and in-memory fakes in tests.
//!
//! ## Mocking & Testing
//! - Every trait is annotated with `automock`; the generated `Mock*` types are
//!   exported when the `test-export-mocks` feature is on (the default).
//!
//! ## Error convention
//! - Collaborators return [`BoxError`]. The core wraps those into
//!   [`crate::error::MirrorError`] with the context of the failing step.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;
use crate::report::ErrorRecord;

/// Boxed error returned by every collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Prefix of a fully-qualified branch reference.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// The minimal identity of one repository: the unit of work on the queue.
///
/// Serialized as `{"name": .., "owner": .., "ref": ..}`; that JSON object is
/// the body of one work message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub owner: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl RepositoryDescriptor {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            git_ref: git_ref.into(),
        }
    }

    /// Builds the descriptor for a repository listed by the provider,
    /// pointing at its default branch.
    pub fn for_default_branch(repository: ProviderRepository) -> Self {
        Self {
            git_ref: format!("{BRANCH_REF_PREFIX}{}", repository.default_branch),
            name: repository.name,
            owner: repository.owner.login,
        }
    }

    /// Parses one work message body.
    pub fn from_message_body(body: &str) -> Result<Self, MirrorError> {
        Ok(serde_json::from_str(body)?)
    }

    /// The JSON body published for this descriptor.
    pub fn to_message_body(&self) -> Result<String, MirrorError> {
        serde_json::to_string(self).map_err(|e| MirrorError::Publish {
            repository: self.to_string(),
            source: Box::new(e),
        })
    }

    /// All three fields are required and must be non-blank. The name must
    /// also be a single path component, since it names the staging directory.
    pub fn validate(&self) -> Result<(), MirrorError> {
        for (field, value) in [
            ("name", &self.name),
            ("owner", &self.owner),
            ("ref", &self.git_ref),
        ] {
            if value.trim().is_empty() {
                return Err(MirrorError::InvalidArgument(format!(
                    "repository descriptor field `{field}` is required"
                )));
            }
        }
        let mut components = Path::new(&self.name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) if c == self.name.as_str() => Ok(()),
            _ => Err(MirrorError::InvalidArgument(format!(
                "repository name `{}` is not a single path component",
                self.name
            ))),
        }
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.git_ref)
    }
}

/// Owner block of a provider listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// One repository as listed by the provider. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRepository {
    pub name: String,
    pub owner: RepositoryOwner,
    pub default_branch: String,
}

impl ProviderRepository {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner: RepositoryOwner {
                login: owner.into(),
            },
            default_branch: default_branch.into(),
        }
    }
}

/// One page of an organization listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPage {
    pub repositories: Vec<ProviderRepository>,
    /// Whether the provider reported a following page.
    pub has_next: bool,
}

/// Source-control provider: organization listing and archive download.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Fetch one page (1-based) of the organization's repositories.
    async fn list_org_repositories(
        &self,
        organization: &str,
        per_page: u32,
        page: u32,
    ) -> Result<RepositoryPage, BoxError>;

    /// Download the zip snapshot of `owner/repo` at `git_ref`.
    async fn download_archive(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<u8>, BoxError>;
}

/// Durable work queue.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Publish one message, returning the queue-assigned message id.
    async fn publish(&self, queue_url: &str, body: String) -> Result<String, BoxError>;
}

/// A message taken off the work queue, not yet deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

/// Receiving side of the work queue. A received message stays invisible
/// until it is acknowledged or its visibility timeout lapses.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WorkReceiver: Send + Sync {
    /// Long-poll for at most one message.
    async fn receive_one(
        &self,
        queue_url: &str,
        wait_seconds: i32,
    ) -> Result<Option<ReceivedMessage>, BoxError>;

    /// Delete a handled message so it is not redelivered.
    async fn acknowledge(&self, queue_url: &str, receipt_handle: &str) -> Result<(), BoxError>;
}

/// What object storage knows about an existing object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    /// SHA-256 hex digest recorded in the object's metadata at upload time.
    pub sha256: Option<String>,
}

/// A local file to be written to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUpload {
    pub bucket: String,
    pub key: String,
    pub source: PathBuf,
    pub size: u64,
    pub content_type: String,
    pub sha256: String,
}

/// Object storage destination.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Look up an object, `None` when it does not exist.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<Option<RemoteObject>, BoxError>;

    /// Single-request upload. Implementors must store `sha256` as object metadata.
    async fn put_object(&self, upload: &ObjectUpload) -> Result<(), BoxError>;

    /// Multi-part upload in parts of `part_size` bytes. Same metadata contract
    /// as [`ObjectStore::put_object`].
    async fn put_object_multipart(
        &self,
        upload: &ObjectUpload,
        part_size: u64,
    ) -> Result<(), BoxError>;
}

/// Side store for failure records.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ErrorLogStore: Send + Sync {
    async fn put_record(&self, table: &str, record: &ErrorRecord) -> Result<(), BoxError>;
}
