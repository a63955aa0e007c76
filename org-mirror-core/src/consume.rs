//! Consumer orchestration: one work message in, one archive mirrored out.
//!
//! States run `ParsingMessage → ValidatingConfig → Fetching → Staging →
//! Syncing → Done`. The message is parsed before configuration is checked,
//! so a malformed body is reported as such even on a misconfigured
//! deployment. Handling the same message twice leaves storage unchanged.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info};

use crate::config::{ConsumerConfig, ValidConsumerConfig};
use crate::contract::{ErrorLogStore, ObjectStore, RepositoryDescriptor, RepositoryProvider};
use crate::error::{InvocationError, MirrorError};
use crate::fetch::{fetch_archive, stage_archive, StagedArchive};
use crate::report::{ErrorReporter, InvocationContext};
use crate::sync::{
    sync_directory, ObjectLocation, SyncOptions, SyncReport, TransferMonitor, ARCHIVE_CONTENT_TYPE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    ParsingMessage,
    ValidatingConfig,
    Fetching,
    Staging,
    Syncing,
    Done,
    Failed,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::ParsingMessage => "ParsingMessage",
            ConsumerState::ValidatingConfig => "ValidatingConfig",
            ConsumerState::Fetching => "Fetching",
            ConsumerState::Staging => "Staging",
            ConsumerState::Syncing => "Syncing",
            ConsumerState::Done => "Done",
            ConsumerState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful consumer invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumeSummary {
    /// `owner/name@ref`.
    pub repository: String,
    pub archive_path: PathBuf,
    /// `bucket/prefix` the staging directory was mirrored to.
    pub destination: String,
    pub sync: SyncReport,
}

enum Stage<'c> {
    ParsingMessage,
    ValidatingConfig(RepositoryDescriptor),
    Fetching(ValidConsumerConfig<'c>, RepositoryDescriptor),
    Staging(ValidConsumerConfig<'c>, RepositoryDescriptor, Vec<u8>),
    Syncing(ValidConsumerConfig<'c>, RepositoryDescriptor, StagedArchive),
    Done(ConsumeSummary),
}

impl Stage<'_> {
    fn state(&self) -> ConsumerState {
        match self {
            Stage::ParsingMessage => ConsumerState::ParsingMessage,
            Stage::ValidatingConfig(_) => ConsumerState::ValidatingConfig,
            Stage::Fetching(..) => ConsumerState::Fetching,
            Stage::Staging(..) => ConsumerState::Staging,
            Stage::Syncing(..) => ConsumerState::Syncing,
            Stage::Done(_) => ConsumerState::Done,
        }
    }
}

/// Queue-triggered entry point.
pub struct Consumer<P, O, S> {
    provider: P,
    store: O,
    reporter: ErrorReporter<S>,
    monitor: TransferMonitor,
}

impl<P, O, S> Consumer<P, O, S>
where
    P: RepositoryProvider,
    O: ObjectStore,
    S: ErrorLogStore,
{
    pub fn new(provider: P, store: O, reporter: ErrorReporter<S>) -> Self {
        Self {
            provider,
            store,
            reporter,
            monitor: TransferMonitor::default(),
        }
    }

    pub fn with_monitor(mut self, monitor: TransferMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Handle one work message body.
    pub async fn handle_message(
        &self,
        body: &str,
        config: &ConsumerConfig,
        ctx: &InvocationContext,
    ) -> Result<ConsumeSummary, InvocationError> {
        let mut stage = Stage::ParsingMessage;
        loop {
            let state = stage.state();
            info!(state = %state, function = %ctx.function_name, "[CONSUME] Entering state");
            stage = match self.advance(stage, body, config).await {
                Ok(Stage::Done(summary)) => {
                    info!(
                        state = %ConsumerState::Done,
                        repository = %summary.repository,
                        uploaded = summary.sync.uploaded.len(),
                        skipped = summary.sync.skipped.len(),
                        "[CONSUME] Invocation complete"
                    );
                    return Ok(summary);
                }
                Ok(next) => next,
                Err(err) => return Err(self.fail(state, err, ctx).await),
            };
        }
    }

    async fn advance<'c>(
        &self,
        stage: Stage<'c>,
        body: &str,
        config: &'c ConsumerConfig,
    ) -> Result<Stage<'c>, MirrorError> {
        match stage {
            Stage::ParsingMessage => {
                let descriptor = RepositoryDescriptor::from_message_body(body)?;
                descriptor.validate()?;
                Ok(Stage::ValidatingConfig(descriptor))
            }
            Stage::ValidatingConfig(descriptor) => {
                config.trace_loaded();
                Ok(Stage::Fetching(config.validate()?, descriptor))
            }
            Stage::Fetching(valid, descriptor) => {
                let bytes = fetch_archive(&self.provider, &descriptor).await?;
                Ok(Stage::Staging(valid, descriptor, bytes))
            }
            Stage::Staging(valid, descriptor, bytes) => {
                let staged = stage_archive(valid.staging_root, &descriptor, &bytes).await?;
                Ok(Stage::Syncing(valid, descriptor, staged))
            }
            Stage::Syncing(valid, descriptor, staged) => {
                let destination = ObjectLocation::parse(&valid.destination())?;
                let options = SyncOptions {
                    multipart_threshold: valid.multipart_threshold,
                    content_type: ARCHIVE_CONTENT_TYPE.to_string(),
                };
                let sync = sync_directory(
                    &self.store,
                    &staged.directory,
                    &destination,
                    &options,
                    &self.monitor,
                )
                .await?;
                Ok(Stage::Done(ConsumeSummary {
                    repository: descriptor.to_string(),
                    archive_path: staged.archive,
                    destination: destination.to_string(),
                    sync,
                }))
            }
            Stage::Done(summary) => Ok(Stage::Done(summary)),
        }
    }

    async fn fail(
        &self,
        state: ConsumerState,
        err: MirrorError,
        ctx: &InvocationContext,
    ) -> InvocationError {
        error!(
            state = %ConsumerState::Failed,
            failed_in = %state,
            error = %err,
            retryable = err.is_retryable(),
            "[CONSUME] Invocation failed"
        );
        self.reporter.report(state.as_str(), &err, ctx).await;
        InvocationError::from(err)
    }
}
