//! Work publishing: one queue message per repository descriptor.

use futures::future::join_all;
use tracing::{error, info};

use crate::contract::{RepositoryDescriptor, WorkQueue};
use crate::error::MirrorError;

/// Result of publishing one descriptor.
#[derive(Debug)]
pub struct PublishOutcome {
    pub descriptor: RepositoryDescriptor,
    /// Queue message id on success.
    pub result: Result<String, MirrorError>,
}

/// Publish one descriptor as a JSON message body.
///
/// The queue identifier and every descriptor field are checked before any
/// call to the queue.
pub async fn publish_descriptor<Q>(
    queue: &Q,
    queue_url: &str,
    descriptor: &RepositoryDescriptor,
) -> Result<String, MirrorError>
where
    Q: WorkQueue + ?Sized,
{
    if queue_url.trim().is_empty() {
        return Err(MirrorError::InvalidArgument(
            "destination queue identifier is required".to_string(),
        ));
    }
    descriptor.validate()?;

    let body = descriptor.to_message_body()?;
    let message_id = queue
        .publish(queue_url, body)
        .await
        .map_err(|source| MirrorError::Publish {
            repository: descriptor.to_string(),
            source,
        })?;

    info!(repository = %descriptor, message_id = %message_id, "[PUBLISH] Work item queued");
    Ok(message_id)
}

/// Publish every descriptor concurrently. Each publish runs to completion
/// whatever happens to the others; outcomes come back in input order.
pub async fn publish_all<Q>(
    queue: &Q,
    queue_url: &str,
    descriptors: Vec<RepositoryDescriptor>,
) -> Vec<PublishOutcome>
where
    Q: WorkQueue + ?Sized,
{
    let publishes = descriptors.into_iter().map(|descriptor| async move {
        let result = publish_descriptor(queue, queue_url, &descriptor).await;
        if let Err(e) = &result {
            error!(repository = %descriptor, error = %e, "[PUBLISH] Work item not queued");
        }
        PublishOutcome { descriptor, result }
    });
    join_all(publishes).await
}
