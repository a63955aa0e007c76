//! Organization enumeration: every repository, resolved to a descriptor.

use tracing::{debug, error, info};

use crate::contract::{RepositoryDescriptor, RepositoryProvider};
use crate::error::MirrorError;

/// Largest page size the provider accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// List every repository of `organization`, one page at a time, until the
/// provider reports no further page.
///
/// All-or-nothing: a failed page request discards what was already listed.
pub async fn enumerate_repositories<P>(
    provider: &P,
    organization: &str,
    page_size: u32,
) -> Result<Vec<RepositoryDescriptor>, MirrorError>
where
    P: RepositoryProvider + ?Sized,
{
    if organization.trim().is_empty() {
        return Err(MirrorError::InvalidArgument(
            "organization identifier is required".to_string(),
        ));
    }
    let per_page = page_size.clamp(1, MAX_PAGE_SIZE);

    let mut descriptors = Vec::new();
    let mut page = 1;
    loop {
        let listing = provider
            .list_org_repositories(organization, per_page, page)
            .await
            .map_err(|source| {
                error!(error = ?source, organization, page, "[ENUMERATE] Listing page failed");
                MirrorError::ProviderQuery {
                    organization: organization.to_string(),
                    page,
                    source,
                }
            })?;

        debug!(
            organization,
            page,
            count = listing.repositories.len(),
            has_next = listing.has_next,
            "[ENUMERATE] Listed page"
        );

        let exhausted = !listing.has_next || listing.repositories.is_empty();
        descriptors.extend(
            listing
                .repositories
                .into_iter()
                .map(RepositoryDescriptor::for_default_branch),
        );
        if exhausted {
            break;
        }
        page += 1;
    }

    info!(
        organization,
        pages = page,
        repositories = descriptors.len(),
        "[ENUMERATE] Enumeration complete"
    );
    Ok(descriptors)
}
