//! Error taxonomy for the mirror pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::contract::BoxError;

/// Every failure the pipeline can produce.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A required setting is absent, blank or unusable.
    #[error("required configuration value `{setting}` is missing or invalid")]
    Configuration { setting: &'static str },

    /// A required argument is absent or unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A listing page request against the provider failed.
    #[error("repository listing for `{organization}` failed on page {page}: {source}")]
    ProviderQuery {
        organization: String,
        page: u32,
        #[source]
        source: BoxError,
    },

    /// Archive download from the provider failed.
    #[error("archive download for {repository} failed: {source}")]
    Fetch {
        repository: String,
        #[source]
        source: BoxError,
    },

    /// Local staging I/O failed.
    #[error("staging I/O error at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One work item could not be published.
    #[error("publishing {repository} failed: {source}")]
    Publish {
        repository: String,
        #[source]
        source: BoxError,
    },

    /// Some work items of a batch could not be published.
    #[error("{failed} of {total} work items failed to publish: {}", .repositories.join(", "))]
    PartialPublish {
        failed: usize,
        total: usize,
        repositories: Vec<String>,
    },

    /// Transfer to object storage failed.
    #[error("sync of `{key}` failed: {source}")]
    Sync {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A work message body is not a repository descriptor.
    #[error("malformed work message: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Coarse class of a [`MirrorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    InvalidArgument,
    Provider,
    Staging,
    Publish,
    Sync,
    Parse,
}

impl MirrorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::Configuration { .. } => ErrorKind::Configuration,
            MirrorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MirrorError::ProviderQuery { .. } | MirrorError::Fetch { .. } => ErrorKind::Provider,
            MirrorError::Staging { .. } => ErrorKind::Staging,
            MirrorError::Publish { .. } | MirrorError::PartialPublish { .. } => ErrorKind::Publish,
            MirrorError::Sync { .. } => ErrorKind::Sync,
            MirrorError::Parse(_) => ErrorKind::Parse,
        }
    }

    /// Whether a later invocation with the same input can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::InvalidArgument | ErrorKind::Parse
        )
    }

    /// Fixed operator-facing message for an invocation that ended on this error.
    pub fn terminal_message(&self) -> &'static str {
        match self {
            MirrorError::Configuration { .. } => "Missing required configuration.",
            MirrorError::InvalidArgument(_) => "Invalid work item.",
            MirrorError::ProviderQuery { .. } => "Repository enumeration failed.",
            MirrorError::Publish { .. } | MirrorError::PartialPublish { .. } => {
                "Publishing work items failed."
            }
            MirrorError::Fetch { .. } | MirrorError::Staging { .. } | MirrorError::Sync { .. } => {
                "Deploy failed."
            }
            MirrorError::Parse(_) => "Malformed work message.",
        }
    }
}

/// Failed invocation as seen by the scheduler or queue.
///
/// Displays only the fixed terminal message; the detail is in `cause` and
/// in the error record written before this value was produced.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvocationError {
    pub message: &'static str,
    pub retryable: bool,
    #[source]
    pub cause: MirrorError,
}

impl InvocationError {
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }
}

impl From<MirrorError> for InvocationError {
    fn from(cause: MirrorError) -> Self {
        Self {
            message: cause.terminal_message(),
            retryable: cause.is_retryable(),
            cause,
        }
    }
}
