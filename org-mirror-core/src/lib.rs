#![doc = "org-mirror-core: the pipeline behind org-mirror, free of any SDK or HTTP client."]

//! Enumerates every repository of a source-control organization, turns each
//! one into a queued work item, and mirrors the default-branch snapshot of
//! each item into object storage.
//!
//! External systems are reached only through the traits in [`contract`];
//! the `org-mirror` crate supplies the real adapters and the tests supply
//! mocks.
//!
//! # Usage
//! Build a [`produce::Producer`] for the scheduled half and a
//! [`consume::Consumer`] for the queue-triggered half.

pub mod config;
pub mod consume;
pub mod contract;
pub mod enumerate;
pub mod error;
pub mod fetch;
pub mod produce;
pub mod publish;
pub mod report;
pub mod sync;

pub use config::{ConsumerConfig, Credential, ProducerConfig};
pub use consume::{ConsumeSummary, Consumer, ConsumerState};
pub use contract::RepositoryDescriptor;
pub use error::{ErrorKind, InvocationError, MirrorError};
pub use produce::{ProduceSummary, Producer, ProducerState};
pub use report::{ErrorRecord, ErrorReporter, InvocationContext};
