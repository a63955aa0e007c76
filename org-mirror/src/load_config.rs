/// `load_config` module: reads the optional YAML settings file and injects
/// environment variables on top of it.
///
/// The YAML file holds non-secret settings only. Secrets (the GitHub token)
/// and per-deployment values come from the environment, which always wins
/// over the file. `.env` files are loaded by the binary through `dotenvy`.
///
/// # Errors
/// Only an unreadable or unparsable file, or a malformed value such as an
/// unknown `ERROR_REPORTING` mode, fails the load. Missing required settings
/// do not: they stay `None` and the orchestrators reject them in their
/// `ValidatingConfig` state so the failure is recorded like any other.
use anyhow::Result;
use org_mirror_core::config::{
    ConsumerConfig, Credential, ProducerConfig, DEFAULT_DESTINATION_PREFIX, DEFAULT_PAGE_SIZE,
};
use org_mirror_core::report::{InvocationContext, DEFAULT_ERROR_TABLE};
use org_mirror_core::sync::MULTIPART_THRESHOLD;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_STAGING_ROOT: &str = "/tmp";

/// YAML-side settings. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub organization: Option<String>,
    pub exports_bucket: Option<String>,
    pub queue_url: Option<String>,
    pub error_table: Option<String>,
    pub staging_root: Option<PathBuf>,
    pub destination_prefix: Option<String>,
    pub page_size: Option<u32>,
    pub multipart_threshold: Option<u64>,
    pub github_api_url: Option<String>,
    pub function_name: Option<String>,
    pub error_reporting: Option<bool>,
}

/// Fully merged settings for one CLI invocation.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub github_token: Option<Credential>,
    pub organization: Option<String>,
    pub exports_bucket: Option<String>,
    pub queue_url: Option<String>,
    pub error_table: String,
    pub staging_root: PathBuf,
    pub destination_prefix: String,
    pub page_size: u32,
    pub multipart_threshold: u64,
    pub github_api_url: String,
    pub function_name: Option<String>,
    pub error_reporting: bool,
}

impl MirrorSettings {
    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            github_token: self.github_token.clone(),
            organization: self.organization.clone(),
            queue_url: self.queue_url.clone(),
            exports_bucket: self.exports_bucket.clone(),
            page_size: self.page_size,
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            github_token: self.github_token.clone(),
            exports_bucket: self.exports_bucket.clone(),
            staging_root: self.staging_root.clone(),
            destination_prefix: self.destination_prefix.clone(),
            multipart_threshold: self.multipart_threshold,
        }
    }

    /// Context naming this deployment, falling back to `default_name`.
    pub fn invocation_context(&self, default_name: &str) -> InvocationContext {
        InvocationContext::new(self.function_name.as_deref().unwrap_or(default_name))
    }
}

/// Load settings from `path` (when given) and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<MirrorSettings> {
    let file = match path {
        Some(path) => read_file_config(path)?,
        None => {
            info!("No config file given, using environment only");
            FileConfig::default()
        }
    };

    let error_reporting = match env_var("ERROR_REPORTING") {
        Some(mode) => parse_reporting_mode(&mode)?,
        None => file.error_reporting.unwrap_or(true),
    };

    let settings = MirrorSettings {
        github_token: env_var("GITHUB_PERSONAL_ACCESS_TOKEN").map(Credential::new),
        organization: env_var("GITHUB_ORGANIZATION").or(file.organization),
        exports_bucket: env_var("EXPORTS_BUCKET").or(file.exports_bucket),
        queue_url: env_var("QUEUE_URL").or(file.queue_url),
        error_table: env_var("ERROR_LOG_TABLE")
            .or(file.error_table)
            .unwrap_or_else(|| DEFAULT_ERROR_TABLE.to_string()),
        staging_root: env_var("STAGING_ROOT")
            .map(PathBuf::from)
            .or(file.staging_root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_ROOT)),
        destination_prefix: file
            .destination_prefix
            .unwrap_or_else(|| DEFAULT_DESTINATION_PREFIX.to_string()),
        page_size: file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        multipart_threshold: file.multipart_threshold.unwrap_or(MULTIPART_THRESHOLD),
        github_api_url: env_var("GITHUB_API_URL")
            .or(file.github_api_url)
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        function_name: env_var("AWS_LAMBDA_FUNCTION_NAME").or(file.function_name),
        error_reporting,
    };

    info!(
        organization = settings.organization.as_deref().unwrap_or("<unset>"),
        exports_bucket = settings.exports_bucket.as_deref().unwrap_or("<unset>"),
        error_table = %settings.error_table,
        error_reporting = settings.error_reporting,
        "Configuration loaded"
    );
    Ok(settings)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path, e)
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })
}

// Unset and empty are the same thing here.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_reporting_mode(mode: &str) -> Result<bool> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "enabled" | "true" | "on" => Ok(true),
        "disabled" | "false" | "off" => Ok(false),
        other => Err(anyhow::anyhow!(
            "ERROR_REPORTING must be `enabled` or `disabled`, got `{other}`"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporting_mode_accepts_both_spellings() {
        assert!(parse_reporting_mode("Enabled").unwrap());
        assert!(!parse_reporting_mode("disabled").unwrap());
        assert!(!parse_reporting_mode(" off ").unwrap());
        assert!(parse_reporting_mode("sometimes").is_err());
    }
}
