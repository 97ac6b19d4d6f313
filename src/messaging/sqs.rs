use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::types::MessageAttributeValue;
use aws_sdk_sqs::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::SqsConfig;

use super::{Message, MessageBroker, MessageHandler};

// ============================================================================
// SQS Backend
// ============================================================================
//
// One long-lived polling worker per subscribe call. Each iteration issues a
// batched long-poll receive and processes the batch sequentially; the next
// receive is not issued until every handler in the batch has returned.
//
// Acknowledgement model: an explicit delete_message on handler Ok. On
// handler Err nothing is done - the message becomes visible again after the
// queue's visibility timeout, and dead-letter redrive is external queue
// configuration.
//
// The broker owns its own cancellation token (in addition to the caller's)
// so close() can stop workers even while the subscribing context is open.
//
// ============================================================================

const MAX_BATCH_SIZE: i32 = 10;
const WAIT_TIME_SECONDS: i32 = 20;
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Shape of an SNS notification wrapping the real payload. Presence of all
/// four fields is what identifies the envelope; everything else in the
/// notification is ignored.
#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Type")]
    _kind: String,
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(rename = "TopicArn")]
    topic_arn: String,
    #[serde(rename = "Message")]
    message: String,
}

pub struct SqsBroker {
    config: SqsConfig,
    client: Mutex<Option<Client>>,
    shutdown: CancellationToken,
}

impl SqsBroker {
    pub fn new(config: SqsConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    async fn client(&self) -> Result<Client> {
        let guard = self.client.lock().await;
        guard.clone().context("SQS broker is not connected")
    }

    async fn queue_url(client: &Client, topic: &str) -> Result<String> {
        let output = client.get_queue_url().queue_name(topic).send().await?;
        let url = output
            .queue_url()
            .with_context(|| format!("no queue URL for topic {topic}"))?;
        Ok(url.to_string())
    }

    async fn process_message(
        client: &Client,
        queue_url: &str,
        handler: &MessageHandler,
        sqs_message: &aws_sdk_sqs::types::Message,
    ) {
        let raw_body = sqs_message.body().unwrap_or_default();
        let headers = sqs_message
            .message_attributes()
            .map(headers_from_attributes)
            .unwrap_or_default();

        let message = Message {
            id: sqs_message.message_id().unwrap_or_default().to_string(),
            body: unwrap_body(raw_body),
            headers,
        };
        let message_id = message.id.clone();

        match handler(message).await {
            Ok(()) => {
                let Some(receipt) = sqs_message.receipt_handle() else {
                    tracing::error!(message_id = %message_id, "Delivery has no receipt handle");
                    return;
                };
                if let Err(e) = client
                    .delete_message()
                    .queue_url(queue_url)
                    .receipt_handle(receipt)
                    .send()
                    .await
                {
                    tracing::error!(message_id = %message_id, error = %e, "Failed to delete message");
                }
            }
            Err(e) => {
                // No nack primitive: the message becomes visible again after
                // the visibility timeout elapses.
                tracing::warn!(
                    message_id = %message_id,
                    error = %e,
                    "Handler failed, message stays on the queue"
                );
            }
        }
    }
}

#[async_trait]
impl MessageBroker for SqsBroker {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()));
        if let Some(endpoint) = &self.config.endpoint_url {
            tracing::info!(endpoint = %endpoint, "Using custom SQS endpoint");
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        *guard = Some(Client::new(&sdk_config));
        tracing::info!(region = %self.config.region, "Connected to SQS");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Stop the polling workers even if the subscribing contexts are
        // still open, then drop the client.
        self.shutdown.cancel();
        let mut guard = self.client.lock().await;
        if guard.take().is_some() {
            tracing::info!("SQS broker closed");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        let client = self.client().await?;
        let queue_url = Self::queue_url(&client, topic).await?;

        let mut request = client
            .send_message()
            .queue_url(&queue_url)
            .message_body(String::from_utf8_lossy(&message.body).into_owned());

        for (key, value) in &message.headers {
            let attribute = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()?;
            request = request.message_attributes(key, attribute);
        }

        request.send().await?;
        tracing::debug!(topic = %topic, message_id = %message.id, "Published to SQS");
        Ok(())
    }

    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<()> {
        let client = self.client().await?;
        let queue_url = Self::queue_url(&client, topic).await?;
        let shutdown = self.shutdown.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            tracing::info!(topic = %topic, queue_url = %queue_url, "SQS worker started");
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => {
                        tracing::info!(topic = %topic, "SQS worker cancelled");
                        break;
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!(topic = %topic, "SQS worker stopped by broker shutdown");
                        break;
                    }
                    received = client
                        .receive_message()
                        .queue_url(&queue_url)
                        .max_number_of_messages(MAX_BATCH_SIZE)
                        .wait_time_seconds(WAIT_TIME_SECONDS)
                        .message_attribute_names("All")
                        .send() =>
                    {
                        match received {
                            Ok(output) => {
                                for sqs_message in output.messages() {
                                    Self::process_message(&client, &queue_url, &handler, sqs_message)
                                        .await;
                                }
                            }
                            Err(e) => {
                                tracing::error!(topic = %topic, error = %e, "Receive failed");
                                sleep(RECEIVE_ERROR_BACKOFF).await;
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn start(&self, _ctx: CancellationToken) -> Result<()> {
        self.client().await?;
        tracing::info!("SQS broker started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();
        Ok(())
    }
}

/// Detect an SNS notification envelope by shape and, when matched, use its
/// re-encoded `Message` string as the payload; otherwise the raw body is the
/// payload.
fn unwrap_body(raw: &str) -> Vec<u8> {
    match serde_json::from_str::<SnsEnvelope>(raw) {
        Ok(envelope) => {
            tracing::debug!(
                sns_message_id = %envelope.message_id,
                topic_arn = %envelope.topic_arn,
                "Unwrapped SNS notification envelope"
            );
            envelope.message.into_bytes()
        }
        Err(_) => raw.as_bytes().to_vec(),
    }
}

/// Keep only string-valued attributes; binary attributes are intentionally
/// dropped.
fn headers_from_attributes(
    attributes: &HashMap<String, MessageAttributeValue>,
) -> HashMap<String, String> {
    attributes
        .iter()
        .filter_map(|(key, value)| {
            value
                .string_value()
                .map(|text| (key.clone(), text.to_string()))
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================
