//! Producer orchestration: validate, enumerate, publish.
//!
//! One call to [`Producer::run`] is one scheduled invocation. It walks
//! `ValidatingConfig → Enumerating → Publishing → Done`; any failure moves to
//! `Failed`, writes an error record naming the state it failed in, and
//! returns an [`InvocationError`] so the scheduler sees a failed run.
//!
//! Publishing fans out over every descriptor at once. Items that were
//! queued before another item failed stay queued; the consumer tolerates
//! duplicates.

use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use crate::config::{ProducerConfig, ValidProducerConfig};
use crate::contract::{ErrorLogStore, RepositoryDescriptor, RepositoryProvider, WorkQueue};
use crate::enumerate::enumerate_repositories;
use crate::error::{InvocationError, MirrorError};
use crate::publish::publish_all;
use crate::report::{ErrorReporter, InvocationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    ValidatingConfig,
    Enumerating,
    Publishing,
    Done,
    Failed,
}

impl ProducerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProducerState::ValidatingConfig => "ValidatingConfig",
            ProducerState::Enumerating => "Enumerating",
            ProducerState::Publishing => "Publishing",
            ProducerState::Done => "Done",
            ProducerState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful producer invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProduceSummary {
    pub organization: String,
    pub discovered: usize,
    pub published: usize,
}

enum Stage<'c> {
    ValidatingConfig,
    Enumerating(ValidProducerConfig<'c>),
    Publishing(ValidProducerConfig<'c>, Vec<RepositoryDescriptor>),
    Done(ProduceSummary),
}

impl Stage<'_> {
    fn state(&self) -> ProducerState {
        match self {
            Stage::ValidatingConfig => ProducerState::ValidatingConfig,
            Stage::Enumerating(_) => ProducerState::Enumerating,
            Stage::Publishing(..) => ProducerState::Publishing,
            Stage::Done(_) => ProducerState::Done,
        }
    }
}

/// Scheduled entry point. Collaborators are injected at construction.
pub struct Producer<P, Q, S> {
    provider: P,
    queue: Q,
    reporter: ErrorReporter<S>,
}

impl<P, Q, S> Producer<P, Q, S>
where
    P: RepositoryProvider,
    Q: WorkQueue,
    S: ErrorLogStore,
{
    pub fn new(provider: P, queue: Q, reporter: ErrorReporter<S>) -> Self {
        Self {
            provider,
            queue,
            reporter,
        }
    }

    /// Run one producer invocation.
    pub async fn run(
        &self,
        config: &ProducerConfig,
        ctx: &InvocationContext,
    ) -> Result<ProduceSummary, InvocationError> {
        let mut stage = Stage::ValidatingConfig;
        loop {
            let state = stage.state();
            info!(state = %state, function = %ctx.function_name, "[PRODUCE] Entering state");
            stage = match self.advance(stage, config).await {
                Ok(Stage::Done(summary)) => {
                    info!(
                        state = %ProducerState::Done,
                        organization = %summary.organization,
                        published = summary.published,
                        "[PRODUCE] Invocation complete"
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
        config: &'c ProducerConfig,
    ) -> Result<Stage<'c>, MirrorError> {
        match stage {
            Stage::ValidatingConfig => {
                config.trace_loaded();
                Ok(Stage::Enumerating(config.validate()?))
            }
            Stage::Enumerating(valid) => {
                let descriptors =
                    enumerate_repositories(&self.provider, valid.organization, valid.page_size)
                        .await?;
                Ok(Stage::Publishing(valid, descriptors))
            }
            Stage::Publishing(valid, descriptors) => {
                let total = descriptors.len();
                let outcomes = publish_all(&self.queue, valid.queue_url, descriptors).await;
                let failed: Vec<String> = outcomes
                    .iter()
                    .filter(|o| o.result.is_err())
                    .map(|o| o.descriptor.to_string())
                    .collect();
                if !failed.is_empty() {
                    return Err(MirrorError::PartialPublish {
                        failed: failed.len(),
                        total,
                        repositories: failed,
                    });
                }
                Ok(Stage::Done(ProduceSummary {
                    organization: valid.organization.to_string(),
                    discovered: total,
                    published: total,
                }))
            }
            Stage::Done(summary) => Ok(Stage::Done(summary)),
        }
    }

    async fn fail(
        &self,
        state: ProducerState,
        err: MirrorError,
        ctx: &InvocationContext,
    ) -> InvocationError {
        error!(
            state = %ProducerState::Failed,
            failed_in = %state,
            error = %err,
            retryable = err.is_retryable(),
            "[PRODUCE] Invocation failed"
        );
        self.reporter.report(state.as_str(), &err, ctx).await;
        InvocationError::from(err)
    }
}
