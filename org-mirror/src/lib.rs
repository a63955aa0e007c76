pub mod aws;
pub mod cli;
pub mod error_log;
pub mod github;
pub mod load_config;
pub mod queue;
pub mod storage;

pub use cli::{run, Cli, Commands};
