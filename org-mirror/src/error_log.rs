//! DynamoDB adapter for [`ErrorLogStore`].
//!
//! Each record becomes one item: `ttl` as a number attribute at the top level
//! (the table's expiry attribute) and the whole record as the `data` map.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use org_mirror_core::contract::{BoxError, ErrorLogStore};
use org_mirror_core::report::ErrorRecord;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::aws::{sdk_error, LazySdkConfig};

pub struct DynamoErrorLog {
    aws: LazySdkConfig,
    client: OnceCell<Client>,
}

impl DynamoErrorLog {
    pub fn new(aws: LazySdkConfig) -> Self {
        Self {
            aws,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async { Client::new(self.aws.get().await) })
            .await
    }
}

#[async_trait]
impl ErrorLogStore for DynamoErrorLog {
    async fn put_record(&self, table: &str, record: &ErrorRecord) -> Result<(), BoxError> {
        self.client()
            .await
            .put_item()
            .table_name(table)
            .item("ttl", AttributeValue::N(record.ttl.to_string()))
            .item("data", AttributeValue::M(record_attributes(record)?))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

/// The record's JSON fields as DynamoDB attributes.
pub fn record_attributes(record: &ErrorRecord) -> Result<HashMap<String, AttributeValue>, BoxError> {
    let Value::Object(fields) = serde_json::to_value(record)? else {
        return Err("error record did not serialize to an object".into());
    };
    Ok(fields
        .into_iter()
        .map(|(name, value)| {
            let attribute = match value {
                Value::Number(n) => AttributeValue::N(n.to_string()),
                Value::String(s) => AttributeValue::S(s),
                other => AttributeValue::S(other.to_string()),
            };
            (name, attribute)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ErrorRecord {
        ErrorRecord {
            lambda_function_name: "process-github".into(),
            event_time_utc: "Tue, 20 Oct 2026 08:15:00 GMT".into(),
            method_name: "Syncing".into(),
            error: "sync of GitHub/web.zip failed".into(),
            ttl: 1_795_594_500,
        }
    }

    #[test]
    fn record_maps_to_string_and_number_attributes() {
        let attributes = record_attributes(&record()).unwrap();
        assert_eq!(
            attributes.get("methodName"),
            Some(&AttributeValue::S("Syncing".into()))
        );
        assert_eq!(
            attributes.get("eventTimeUTC"),
            Some(&AttributeValue::S("Tue, 20 Oct 2026 08:15:00 GMT".into()))
        );
        assert_eq!(
            attributes.get("ttl"),
            Some(&AttributeValue::N("1795594500".into()))
        );
        assert_eq!(attributes.len(), 5);
    }
}
