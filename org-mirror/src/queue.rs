//! SQS adapter for [`WorkQueue`] and [`WorkReceiver`].

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use org_mirror_core::contract::{BoxError, ReceivedMessage, WorkQueue, WorkReceiver};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::aws::{sdk_error, LazySdkConfig};

pub struct SqsWorkQueue {
    aws: LazySdkConfig,
    client: OnceCell<Client>,
}

impl SqsWorkQueue {
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
impl WorkQueue for SqsWorkQueue {
    async fn publish(&self, queue_url: &str, body: String) -> Result<String, BoxError> {
        let output = self
            .client()
            .await
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.message_id.unwrap_or_default())
    }
}

#[async_trait]
impl WorkReceiver for SqsWorkQueue {
    async fn receive_one(
        &self,
        queue_url: &str,
        wait_seconds: i32,
    ) -> Result<Option<ReceivedMessage>, BoxError> {
        let output = self
            .client()
            .await
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_seconds.clamp(0, 20))
            .send()
            .await
            .map_err(sdk_error)?;

        let Some(message) = output.messages.unwrap_or_default().into_iter().next() else {
            debug!(queue_url, "[QUEUE] No message available");
            return Ok(None);
        };
        let receipt_handle = message
            .receipt_handle
            .ok_or("received message has no receipt handle")?;
        let received = ReceivedMessage {
            message_id: message.message_id.unwrap_or_default(),
            receipt_handle,
            body: message.body.unwrap_or_default(),
        };
        info!(message_id = %received.message_id, "[QUEUE] Message received");
        Ok(Some(received))
    }

    async fn acknowledge(&self, queue_url: &str, receipt_handle: &str) -> Result<(), BoxError> {
        self.client()
            .await
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(sdk_error)?;
        debug!(queue_url, "[QUEUE] Message deleted");
        Ok(())
    }
}
