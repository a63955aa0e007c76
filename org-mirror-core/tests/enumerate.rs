use org_mirror_core::contract::{MockRepositoryProvider, ProviderRepository, RepositoryPage};
use org_mirror_core::enumerate::enumerate_repositories;
use org_mirror_core::{MirrorError, RepositoryDescriptor};

fn listing(names: &[(&str, &str)], has_next: bool) -> RepositoryPage {
    RepositoryPage {
        repositories: names
            .iter()
            .map(|(name, branch)| ProviderRepository::new(*name, "acme", *branch))
            .collect(),
        has_next,
    }
}

#[tokio::test]
async fn test_enumerate_follows_every_page() {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .withf(|org, per_page, _| org == "acme" && *per_page == 2)
        .times(3)
        .returning(|_, _, page| {
            Ok(match page {
                1 => listing(&[("web", "main"), ("api", "main")], true),
                2 => listing(&[("infra", "trunk"), ("docs", "main")], true),
                _ => listing(&[("tools", "develop")], false),
            })
        });

    let descriptors = enumerate_repositories(&provider, "acme", 2).await.unwrap();

    assert_eq!(descriptors.len(), 5);
    assert!(descriptors
        .iter()
        .all(|d| d.owner == "acme" && d.git_ref.starts_with("refs/heads/")));
    assert_eq!(
        descriptors[4],
        RepositoryDescriptor::new("tools", "acme", "refs/heads/develop")
    );
}

#[tokio::test]
async fn test_enumerate_three_repositories_on_one_page() {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .times(1)
        .returning(|_, _, _| {
            Ok(listing(
                &[("web", "main"), ("api", "main"), ("infra", "trunk")],
                false,
            ))
        });

    let descriptors = enumerate_repositories(&provider, "acme", 100).await.unwrap();

    assert_eq!(
        descriptors,
        vec![
            RepositoryDescriptor::new("web", "acme", "refs/heads/main"),
            RepositoryDescriptor::new("api", "acme", "refs/heads/main"),
            RepositoryDescriptor::new("infra", "acme", "refs/heads/trunk"),
        ]
    );
}

#[tokio::test]
async fn test_enumerate_fails_whole_when_a_page_fails() {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .times(2)
        .returning(|_, _, page| match page {
            1 => Ok(listing(&[("web", "main")], true)),
            _ => Err("502 Bad Gateway".into()),
        });

    let err = enumerate_repositories(&provider, "acme", 1).await.unwrap_err();

    match err {
        MirrorError::ProviderQuery {
            organization, page, ..
        } => {
            assert_eq!(organization, "acme");
            assert_eq!(page, 2);
        }
        other => panic!("expected provider query error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_enumerate_empty_organization_is_rejected_before_any_call() {
    let mut provider = MockRepositoryProvider::new();
    provider.expect_list_org_repositories().times(0);

    let err = enumerate_repositories(&provider, "  ", 100).await.unwrap_err();
    assert!(matches!(err, MirrorError::InvalidArgument(_)), "got {err:?}");
}

#[tokio::test]
async fn test_enumerate_clamps_page_size() {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .withf(|_, per_page, page| *per_page == 100 && *page == 1)
        .times(1)
        .returning(|_, _, _| Ok(listing(&[], false)));

    let descriptors = enumerate_repositories(&provider, "acme", 500).await.unwrap();
    assert!(descriptors.is_empty());
}
