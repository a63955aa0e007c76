use org_mirror_core::contract::MockWorkQueue;
use org_mirror_core::publish::{publish_all, publish_descriptor};
use org_mirror_core::{MirrorError, RepositoryDescriptor};

const QUEUE_URL: &str = "https://sqs.eu-west-1.amazonaws.com/123456789012/mirror";

#[tokio::test]
async fn test_publish_sends_descriptor_json() {
    let mut queue = MockWorkQueue::new();
    queue
        .expect_publish()
        .withf(|url, body| {
            url == QUEUE_URL && body == r#"{"name":"web","owner":"acme","ref":"refs/heads/main"}"#
        })
        .times(1)
        .returning(|_, _| Ok("msg-1".to_string()));

    let descriptor = RepositoryDescriptor::new("web", "acme", "refs/heads/main");
    let id = publish_descriptor(&queue, QUEUE_URL, &descriptor).await.unwrap();
    assert_eq!(id, "msg-1");
}

#[tokio::test]
async fn test_publish_rejects_invalid_input_before_calling_queue() {
    let mut queue = MockWorkQueue::new();
    queue.expect_publish().times(0);

    let valid = RepositoryDescriptor::new("web", "acme", "refs/heads/main");
    let err = publish_descriptor(&queue, "", &valid).await.unwrap_err();
    assert!(matches!(err, MirrorError::InvalidArgument(_)), "got {err:?}");

    for descriptor in [
        RepositoryDescriptor::new("", "acme", "refs/heads/main"),
        RepositoryDescriptor::new("web", "", "refs/heads/main"),
        RepositoryDescriptor::new("web", "acme", ""),
    ] {
        let err = publish_descriptor(&queue, QUEUE_URL, &descriptor)
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::InvalidArgument(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn test_publish_all_isolates_failures() {
    let mut queue = MockWorkQueue::new();
    queue.expect_publish().times(3).returning(|_, body| {
        if body.contains("\"api\"") {
            Err("throttled".into())
        } else {
            Ok(format!("id-{}", body.len()))
        }
    });

    let outcomes = publish_all(
        &queue,
        QUEUE_URL,
        vec![
            RepositoryDescriptor::new("web", "acme", "refs/heads/main"),
            RepositoryDescriptor::new("api", "acme", "refs/heads/main"),
            RepositoryDescriptor::new("infra", "acme", "refs/heads/trunk"),
        ],
    )
    .await;

    let names: Vec<&str> = outcomes.iter().map(|o| o.descriptor.name.as_str()).collect();
    assert_eq!(names, ["web", "api", "infra"]);
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(MirrorError::Publish { .. })
    ));
    assert!(outcomes[2].result.is_ok());
}
