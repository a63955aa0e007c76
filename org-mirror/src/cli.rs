/// # org-mirror CLI
///
/// Command parsing and wiring for the two halves of the mirror:
///
/// - `produce`: one scheduled producer run. Lists the organization and queues
///   one work item per repository.
/// - `consume`: one consumer run, either for a message body given on the
///   command line or for a single message received from the work queue.
///
/// All pipeline logic lives in [`org_mirror_core`]; this module only builds
/// the real collaborators and hands them to the orchestrators.
use crate::aws::LazySdkConfig;
use crate::error_log::DynamoErrorLog;
use crate::github::GitHubClient;
use crate::load_config::{load_config, MirrorSettings};
use crate::queue::SqsWorkQueue;
use crate::storage::S3ObjectStore;
use anyhow::Result;
use clap::{Parser, Subcommand};
use org_mirror_core::contract::{ErrorLogStore, ObjectStore, RepositoryProvider, WorkReceiver};
use org_mirror_core::{
    ConsumeSummary, Consumer, ConsumerConfig, ErrorReporter, InvocationContext, Producer,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Function name recorded for producer failures when none is configured.
pub const PRODUCER_FUNCTION_NAME: &str = "org-mirror-produce";
/// Function name recorded for consumer failures when none is configured.
pub const CONSUMER_FUNCTION_NAME: &str = "org-mirror-consume";

/// CLI for org-mirror: mirror a GitHub organization into S3.
#[derive(Parser)]
#[clap(
    name = "org-mirror",
    version,
    about = "Mirror every repository of a GitHub organization into S3 through a work queue"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enumerate the organization and queue one work item per repository
    Produce {
        /// Optional YAML settings file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Archive and mirror one repository work item
    Consume {
        /// Optional YAML settings file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Work message body; when absent one message is taken from QUEUE_URL
        #[clap(long)]
        body: Option<String>,
        /// Long-poll wait when receiving from the queue
        #[clap(long, default_value_t = 20)]
        wait_seconds: i32,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    // Loaded on first AWS call, after the orchestrators validated their settings.
    let aws = LazySdkConfig::new();
    match cli.command {
        Commands::Produce { config } => {
            let settings = load_config(config.as_deref())?;
            info!(command = "produce", "Starting producer invocation");
            produce(&settings, aws).await
        }
        Commands::Consume {
            config,
            body,
            wait_seconds,
        } => {
            let settings = load_config(config.as_deref())?;
            info!(command = "consume", "Starting consumer invocation");
            let consumer = build_consumer(&settings, &aws)?;
            let config = settings.consumer_config();
            let ctx = settings.invocation_context(CONSUMER_FUNCTION_NAME);
            match body {
                Some(body) => {
                    let summary = consumer.handle_message(&body, &config, &ctx).await?;
                    print_summary(&summary)
                }
                None => {
                    let queue_url = settings.queue_url.as_deref().ok_or_else(|| {
                        anyhow::anyhow!("QUEUE_URL is required to receive work without --body")
                    })?;
                    let queue = SqsWorkQueue::new(aws);
                    match consume_one(&queue, queue_url, wait_seconds, &consumer, &config, &ctx)
                        .await?
                    {
                        Some(summary) => print_summary(&summary),
                        None => Ok(()),
                    }
                }
            }
        }
    }
}

async fn produce(settings: &MirrorSettings, aws: LazySdkConfig) -> Result<()> {
    let provider = GitHubClient::new(&settings.github_api_url, settings.github_token.as_ref())
        .map_err(anyhow::Error::msg)?;
    let reporter = reporter(settings, &aws);
    let producer = Producer::new(provider, SqsWorkQueue::new(aws), reporter);

    let summary = producer
        .run(
            &settings.producer_config(),
            &settings.invocation_context(PRODUCER_FUNCTION_NAME),
        )
        .await?;
    print_summary(&summary)
}

/// Take one message off the queue, handle it, and delete it only once it was
/// handled. A failed run leaves the message for the queue to redeliver.
/// Receiving nothing is `Ok(None)`.
pub async fn consume_one<R, P, O, S>(
    receiver: &R,
    queue_url: &str,
    wait_seconds: i32,
    consumer: &Consumer<P, O, S>,
    config: &ConsumerConfig,
    ctx: &InvocationContext,
) -> Result<Option<ConsumeSummary>>
where
    R: WorkReceiver,
    P: RepositoryProvider,
    O: ObjectStore,
    S: ErrorLogStore,
{
    let Some(message) = receiver
        .receive_one(queue_url, wait_seconds)
        .await
        .map_err(anyhow::Error::msg)?
    else {
        info!(queue_url, "No work message received, nothing to do");
        return Ok(None);
    };

    let summary = consumer.handle_message(&message.body, config, ctx).await?;
    receiver
        .acknowledge(queue_url, &message.receipt_handle)
        .await
        .map_err(anyhow::Error::msg)?;
    Ok(Some(summary))
}

fn build_consumer(
    settings: &MirrorSettings,
    aws: &LazySdkConfig,
) -> Result<Consumer<GitHubClient, S3ObjectStore, DynamoErrorLog>> {
    let provider = GitHubClient::new(&settings.github_api_url, settings.github_token.as_ref())
        .map_err(anyhow::Error::msg)?;
    let store = S3ObjectStore::new(aws.clone());
    Ok(Consumer::new(provider, store, reporter(settings, aws)))
}

fn reporter(settings: &MirrorSettings, aws: &LazySdkConfig) -> ErrorReporter<DynamoErrorLog> {
    ErrorReporter::new(DynamoErrorLog::new(aws.clone()), settings.error_table.clone())
        .with_enabled(settings.error_reporting)
}

fn print_summary<T: Serialize>(summary: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
