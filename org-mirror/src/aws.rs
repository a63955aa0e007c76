//! Shared AWS plumbing for the SQS, S3 and DynamoDB adapters.

use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::error::DisplayErrorContext;
use org_mirror_core::contract::BoxError;
use tokio::sync::OnceCell;
use tracing::debug;

/// Region and credentials from the standard provider chain, resolved on
/// first use. Resolving the region may query instance metadata, so nothing
/// is loaded until an adapter actually talks to AWS.
#[derive(Clone, Default)]
pub struct LazySdkConfig {
    cell: Arc<OnceCell<SdkConfig>>,
}

impl LazySdkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> &SdkConfig {
        self.cell
            .get_or_init(|| async {
                debug!("[AWS] Loading SDK configuration");
                aws_config::defaults(BehaviorVersion::latest()).load().await
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

/// Flattens an SDK error, including its full source chain, into a
/// [`BoxError`].
pub(crate) fn sdk_error<E: std::error::Error>(err: E) -> BoxError {
    DisplayErrorContext(err).to_string().into()
}
