use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use org_mirror_core::contract::{
    BoxError, MockErrorLogStore, MockRepositoryProvider, MockWorkQueue, ProviderRepository,
    RepositoryPage, WorkQueue,
};
use org_mirror_core::{
    Credential, ErrorKind, ErrorRecord, ErrorReporter, InvocationContext, ProducerConfig, Producer,
};

const QUEUE_URL: &str = "https://sqs.eu-west-1.amazonaws.com/123456789012/mirror";

fn config() -> ProducerConfig {
    ProducerConfig {
        github_token: Some(Credential::new("ghp_test")),
        organization: Some("acme".into()),
        queue_url: Some(QUEUE_URL.into()),
        exports_bucket: Some("exports".into()),
        ..Default::default()
    }
}

fn ctx() -> InvocationContext {
    InvocationContext::new("cron-github")
}

fn acme_provider() -> MockRepositoryProvider {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .times(1)
        .returning(|_, _, _| {
            Ok(RepositoryPage {
                repositories: vec![
                    ProviderRepository::new("web", "acme", "main"),
                    ProviderRepository::new("api", "acme", "main"),
                    ProviderRepository::new("infra", "acme", "trunk"),
                ],
                has_next: false,
            })
        });
    provider
}

/// Error log store that keeps every record it is given.
fn recording_store(records: Arc<Mutex<Vec<ErrorRecord>>>) -> MockErrorLogStore {
    let mut store = MockErrorLogStore::new();
    store.expect_put_record().returning(move |table, record| {
        assert_eq!(table, "errorLogs");
        records.lock().unwrap().push(record.clone());
        Ok(())
    });
    store
}

#[tokio::test]
async fn test_produce_publishes_one_message_per_repository() {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let seen = bodies.clone();
    let mut queue = MockWorkQueue::new();
    queue.expect_publish().times(3).returning(move |_, body| {
        seen.lock().unwrap().push(body);
        Ok("msg".to_string())
    });
    let mut store = MockErrorLogStore::new();
    store.expect_put_record().times(0);

    let producer = Producer::new(acme_provider(), queue, ErrorReporter::new(store, "errorLogs"));
    let summary = producer.run(&config(), &ctx()).await.unwrap();

    assert_eq!(summary.organization, "acme");
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.published, 3);
    let mut bodies = bodies.lock().unwrap().clone();
    bodies.sort();
    assert_eq!(
        bodies,
        vec![
            r#"{"name":"api","owner":"acme","ref":"refs/heads/main"}"#,
            r#"{"name":"infra","owner":"acme","ref":"refs/heads/trunk"}"#,
            r#"{"name":"web","owner":"acme","ref":"refs/heads/main"}"#,
        ]
    );
}

#[tokio::test]
async fn test_produce_missing_setting_fails_before_any_external_call() {
    for setting in ["token", "organization", "queue", "bucket"] {
        let mut config = config();
        match setting {
            "token" => config.github_token = None,
            "organization" => config.organization = None,
            "queue" => config.queue_url = None,
            _ => config.exports_bucket = None,
        }

        let mut provider = MockRepositoryProvider::new();
        provider.expect_list_org_repositories().times(0);
        let mut queue = MockWorkQueue::new();
        queue.expect_publish().times(0);
        let records = Arc::new(Mutex::new(Vec::new()));

        let producer = Producer::new(
            provider,
            queue,
            ErrorReporter::new(recording_store(records.clone()), "errorLogs"),
        );
        let err = producer.run(&config, &ctx()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration, "{setting}");
        assert!(!err.retryable);
        assert_eq!(err.to_string(), "Missing required configuration.");
        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1, "{setting}");
        assert_eq!(records[0].method_name, "ValidatingConfig");
        assert_eq!(records[0].lambda_function_name, "cron-github");
    }
}

#[tokio::test]
async fn test_produce_partial_publish_failure_keeps_other_messages() {
    let mut queue = MockWorkQueue::new();
    queue.expect_publish().times(3).returning(|_, body| {
        if body.contains("\"api\"") {
            Err("throttled".into())
        } else {
            Ok("msg".to_string())
        }
    });
    let records = Arc::new(Mutex::new(Vec::new()));

    let producer = Producer::new(
        acme_provider(),
        queue,
        ErrorReporter::new(recording_store(records.clone()), "errorLogs"),
    );
    let err = producer.run(&config(), &ctx()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Publish);
    assert!(err.retryable);
    assert_eq!(err.to_string(), "Publishing work items failed.");
    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method_name, "Publishing");
    assert!(records[0].error.contains("acme/api"), "{}", records[0].error);
}

#[tokio::test]
async fn test_produce_enumeration_failure_is_reported() {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .returning(|_, _, _| Err("401 Bad credentials".into()));
    let mut queue = MockWorkQueue::new();
    queue.expect_publish().times(0);
    let records = Arc::new(Mutex::new(Vec::new()));

    let producer = Producer::new(
        provider,
        queue,
        ErrorReporter::new(recording_store(records.clone()), "errorLogs"),
    );
    let err = producer.run(&config(), &ctx()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(err.to_string(), "Repository enumeration failed.");
    assert_eq!(records.lock().unwrap()[0].method_name, "Enumerating");
}

#[tokio::test]
async fn test_produce_error_store_outage_does_not_mask_failure() {
    let mut provider = MockRepositoryProvider::new();
    provider
        .expect_list_org_repositories()
        .returning(|_, _, _| Err("timeout".into()));
    let mut store = MockErrorLogStore::new();
    store
        .expect_put_record()
        .times(1)
        .returning(|_, _| Err("table unavailable".into()));

    let producer = Producer::new(
        provider,
        MockWorkQueue::new(),
        ErrorReporter::new(store, "errorLogs"),
    );
    let err = producer.run(&config(), &ctx()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Provider);
}

/// Queue whose publishes only complete once two of them are in flight.
struct RendezvousQueue {
    barrier: Barrier,
}

#[async_trait]
impl WorkQueue for RendezvousQueue {
    async fn publish(&self, _queue_url: &str, _body: String) -> Result<String, BoxError> {
        self.barrier.wait().await;
        Ok("msg".to_string())
    }
}

#[tokio::test]
async fn test_produce_publishes_concurrently() {
    let mut provider = MockRepositoryProvider::new();
    provider.expect_list_org_repositories().returning(|_, _, _| {
        Ok(RepositoryPage {
            repositories: vec![
                ProviderRepository::new("web", "acme", "main"),
                ProviderRepository::new("infra", "acme", "trunk"),
            ],
            has_next: false,
        })
    });
    let queue = RendezvousQueue {
        barrier: Barrier::new(2),
    };

    let producer = Producer::new(
        provider,
        queue,
        ErrorReporter::new(MockErrorLogStore::new(), "errorLogs"),
    );
    let summary = tokio::time::timeout(Duration::from_secs(5), producer.run(&config(), &ctx()))
        .await
        .expect("publishes ran one after another")
        .unwrap();

    assert_eq!(summary.published, 2);
}
