use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::MirrorError;
use crate::sync::MULTIPART_THRESHOLD;

/// Default listing page size (the provider's maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Prefix under the exports bucket where archives land.
pub const DEFAULT_DESTINATION_PREFIX: &str = "GitHub";

/// Provider access token. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Settings for one producer invocation. Absent values are rejected by
/// [`ProducerConfig::validate`], not by whoever loads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub github_token: Option<Credential>,
    pub organization: Option<String>,
    pub queue_url: Option<String>,
    pub exports_bucket: Option<String>,
    pub page_size: u32,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            organization: None,
            queue_url: None,
            exports_bucket: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A producer configuration with every required value present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProducerConfig<'a> {
    pub organization: &'a str,
    pub queue_url: &'a str,
    pub page_size: u32,
}

impl ProducerConfig {
    pub fn validate(&self) -> Result<ValidProducerConfig<'_>, MirrorError> {
        required_credential(&self.github_token, "GITHUB_PERSONAL_ACCESS_TOKEN")?;
        let organization = required(&self.organization, "GITHUB_ORGANIZATION")?;
        let queue_url = required(&self.queue_url, "QUEUE_URL")?;
        // Checked for parity with the consumer; the producer never writes to it.
        required(&self.exports_bucket, "EXPORTS_BUCKET")?;
        Ok(ValidProducerConfig {
            organization,
            queue_url,
            page_size: self.page_size,
        })
    }

    pub fn trace_loaded(&self) {
        info!(
            organization = self.organization.as_deref().unwrap_or("<unset>"),
            queue_url = self.queue_url.as_deref().unwrap_or("<unset>"),
            token_set = self.github_token.is_some(),
            page_size = self.page_size,
            "Loaded producer config"
        );
        debug!(?self, "Producer config (full debug)");
    }
}

/// Settings for one consumer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub github_token: Option<Credential>,
    pub exports_bucket: Option<String>,
    /// Root under which `{name}/{name}.zip` is staged.
    pub staging_root: PathBuf,
    pub destination_prefix: String,
    pub multipart_threshold: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            exports_bucket: None,
            staging_root: PathBuf::from("/tmp"),
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
            multipart_threshold: MULTIPART_THRESHOLD,
        }
    }
}

/// A consumer configuration with every required value present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidConsumerConfig<'a> {
    pub exports_bucket: &'a str,
    pub staging_root: &'a Path,
    pub destination_prefix: &'a str,
    pub multipart_threshold: u64,
}

impl ValidConsumerConfig<'_> {
    /// `{bucket}/{prefix}`, the sync destination.
    pub fn destination(&self) -> String {
        format!("{}/{}", self.exports_bucket, self.destination_prefix)
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<ValidConsumerConfig<'_>, MirrorError> {
        required_credential(&self.github_token, "GITHUB_PERSONAL_ACCESS_TOKEN")?;
        let exports_bucket = required(&self.exports_bucket, "EXPORTS_BUCKET")?;
        if self.multipart_threshold == 0 {
            return Err(MirrorError::Configuration {
                setting: "multipart_threshold",
            });
        }
        Ok(ValidConsumerConfig {
            exports_bucket,
            staging_root: &self.staging_root,
            destination_prefix: &self.destination_prefix,
            multipart_threshold: self.multipart_threshold,
        })
    }

    pub fn trace_loaded(&self) {
        info!(
            exports_bucket = self.exports_bucket.as_deref().unwrap_or("<unset>"),
            staging_root = %self.staging_root.display(),
            destination_prefix = %self.destination_prefix,
            token_set = self.github_token.is_some(),
            "Loaded consumer config"
        );
    }
}

fn required<'a>(value: &'a Option<String>, setting: &'static str) -> Result<&'a str, MirrorError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MirrorError::Configuration { setting }),
    }
}

fn required_credential(
    value: &Option<Credential>,
    setting: &'static str,
) -> Result<(), MirrorError> {
    match value {
        Some(c) if !c.expose().trim().is_empty() => Ok(()),
        _ => Err(MirrorError::Configuration { setting }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer() -> ProducerConfig {
        ProducerConfig {
            github_token: Some(Credential::new("ghp_test")),
            organization: Some("acme".into()),
            queue_url: Some("https://sqs.eu-west-1.amazonaws.com/1/mirror".into()),
            exports_bucket: Some("exports".into()),
            page_size: 50,
        }
    }

    fn missing_setting(err: MirrorError) -> &'static str {
        match err {
            MirrorError::Configuration { setting } => setting,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn complete_producer_config_validates() {
        let config = producer();
        let valid = config.validate().unwrap();
        assert_eq!(valid.organization, "acme");
        assert_eq!(valid.page_size, 50);
    }

    #[test]
    fn each_missing_producer_setting_is_named() {
        for expected in [
            "GITHUB_PERSONAL_ACCESS_TOKEN",
            "GITHUB_ORGANIZATION",
            "QUEUE_URL",
            "EXPORTS_BUCKET",
        ] {
            let mut config = producer();
            match expected {
                "GITHUB_PERSONAL_ACCESS_TOKEN" => config.github_token = None,
                "GITHUB_ORGANIZATION" => config.organization = None,
                "QUEUE_URL" => config.queue_url = Some("  ".into()),
                _ => config.exports_bucket = None,
            }
            assert_eq!(missing_setting(config.validate().unwrap_err()), expected);
        }
    }

    #[test]
    fn consumer_requires_token_and_bucket() {
        let mut config = ConsumerConfig {
            github_token: Some(Credential::new("ghp_test")),
            exports_bucket: Some("exports".into()),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().destination(), "exports/GitHub");

        config.exports_bucket = Some(String::new());
        assert_eq!(missing_setting(config.validate().unwrap_err()), "EXPORTS_BUCKET");

        config.github_token = Some(Credential::new(""));
        assert_eq!(
            missing_setting(config.validate().unwrap_err()),
            "GITHUB_PERSONAL_ACCESS_TOKEN"
        );
    }

    #[test]
    fn zero_multipart_threshold_is_a_configuration_error() {
        let config = ConsumerConfig {
            github_token: Some(Credential::new("ghp_test")),
            exports_bucket: Some("exports".into()),
            multipart_threshold: 0,
            ..Default::default()
        };
        assert_eq!(
            missing_setting(config.validate().unwrap_err()),
            "multipart_threshold"
        );
    }

    #[test]
    fn credential_debug_is_redacted() {
        let config = producer();
        assert!(!format!("{config:?}").contains("ghp_test"));
    }
}
