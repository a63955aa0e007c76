//! Best-effort failure records for operators.
//!
//! Orchestrators call [`ErrorReporter::report`] on every failed invocation
//! before surfacing the error. The reporter never fails: a store outage is
//! logged and dropped so the original error stays the one the caller sees.

use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::contract::ErrorLogStore;

/// Records expire from the log store 30 days after they are written.
pub const ERROR_RECORD_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Table written to when none is configured.
pub const DEFAULT_ERROR_TABLE: &str = "errorLogs";

/// One failure, as written to the error log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub lambda_function_name: String,
    #[serde(rename = "eventTimeUTC")]
    pub event_time_utc: String,
    pub method_name: String,
    pub error: String,
    /// Expiry as epoch seconds.
    pub ttl: i64,
}

impl ErrorRecord {
    pub fn new(
        function_name: &str,
        method_name: &str,
        error: impl Display,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            lambda_function_name: function_name.to_string(),
            event_time_utc: now.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            method_name: method_name.to_string(),
            error: error.to_string(),
            ttl: (now + Duration::seconds(ERROR_RECORD_TTL_SECS)).timestamp(),
        }
    }
}

/// Per-invocation context handed to the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub function_name: String,
}

impl InvocationContext {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
        }
    }
}

/// Writes [`ErrorRecord`]s to an [`ErrorLogStore`].
pub struct ErrorReporter<S> {
    store: S,
    table: String,
    enabled: bool,
}

impl<S: ErrorLogStore> ErrorReporter<S> {
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            enabled: true,
        }
    }

    /// When disabled, records are still logged locally but never written.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record one failure. Never fails.
    pub async fn report(&self, method_name: &str, error: impl Display, ctx: &InvocationContext) {
        let record = ErrorRecord::new(&ctx.function_name, method_name, error, Utc::now());
        warn!(
            function = %record.lambda_function_name,
            method = %record.method_name,
            error = %record.error,
            ttl = record.ttl,
            "[REPORT] Recording failure"
        );

        if !self.enabled {
            info!(method = %record.method_name, "[REPORT] Error reporting disabled, record not stored");
            return;
        }

        if let Err(e) = self.store.put_record(&self.table, &record).await {
            error!(
                error = ?e,
                table = %self.table,
                method = %record.method_name,
                "[REPORT] Unable to store error record"
            );
        }
    }
}
