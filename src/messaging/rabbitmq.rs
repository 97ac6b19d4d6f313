use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::RabbitMqConfig;

use super::{Message, MessageBroker, MessageHandler};

// ============================================================================
// RabbitMQ Backend
// ============================================================================
//
// One connection, one channel. A durable topic exchange is declared on
// connect when an exchange name is configured; queues are declared durable
// and bound to it with the topic name as routing key on subscribe.
//
// Acknowledgement model: manual ack only. Handler Ok => basic_ack, handler
// Err => basic_nack with requeue, so the delivery goes back to the queue.
//
// The state mutex serializes broker setup (connect / publish / subscribe
// registration / close). Per-message processing happens on the worker tasks,
// outside the lock.
//
// ============================================================================

const PERSISTENT_DELIVERY_MODE: u8 = 2;

struct RabbitMqState {
    connection: Connection,
    channel: Channel,
}

pub struct RabbitMqBroker {
    config: RabbitMqConfig,
    state: Mutex<Option<RabbitMqState>>,
}

impl RabbitMqBroker {
    pub fn new(config: RabbitMqConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    fn message_from_delivery(delivery: &Delivery) -> Message {
        let id = delivery
            .properties
            .message_id()
            .as_ref()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();

        let headers = delivery
            .properties
            .headers()
            .as_ref()
            .map(headers_from_field_table)
            .unwrap_or_default();

        Message {
            id,
            body: delivery.data.clone(),
            headers,
        }
    }

    async fn process_delivery(handler: &MessageHandler, delivery: Delivery) {
        let message = Self::message_from_delivery(&delivery);
        let message_id = message.id.clone();

        match handler(message).await {
            Ok(()) => {
                if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                    tracing::error!(message_id = %message_id, error = %e, "Failed to ack delivery");
                }
            }
            Err(e) => {
                tracing::warn!(
                    message_id = %message_id,
                    error = %e,
                    "Handler failed, requeueing delivery"
                );
                let nack = BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                };
                if let Err(e) = delivery.acker.nack(nack).await {
                    tracing::error!(message_id = %message_id, error = %e, "Failed to nack delivery");
                }
            }
        }
    }
}

#[async_trait]
impl MessageBroker for RabbitMqBroker {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let connection =
            Connection::connect(&self.config.uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        if let Some(exchange) = &self.config.exchange {
            channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        *guard = Some(RabbitMqState {
            connection,
            channel,
        });

        tracing::info!(exchange = ?self.config.exchange, "Connected to RabbitMQ");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.take() {
            // Tolerate a channel or connection that is already gone.
            if let Err(e) = state.channel.close(200, "closing").await {
                tracing::warn!(error = %e, "Channel already closed");
            }
            if let Err(e) = state.connection.close(200, "closing").await {
                tracing::warn!(error = %e, "Connection already closed");
            }
            tracing::info!("RabbitMQ broker closed");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().context("RabbitMQ broker is not connected")?;

        state
            .channel
            .queue_declare(
                topic,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let mut headers = FieldTable::default();
        for (key, value) in &message.headers {
            headers.insert(
                ShortString::from(key.clone()),
                AMQPValue::LongString(value.as_str().into()),
            );
        }

        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_message_id(ShortString::from(message.id.clone()))
            .with_headers(headers);

        state
            .channel
            .basic_publish(
                "",
                topic,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await?
            .await?;

        tracing::debug!(topic = %topic, message_id = %message.id, "Published to RabbitMQ");
        Ok(())
    }

    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<()> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().context("RabbitMQ broker is not connected")?;

        state
            .channel
            .queue_declare(
                topic,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        if let Some(exchange) = &self.config.exchange {
            state
                .channel
                .queue_bind(
                    topic,
                    exchange,
                    topic,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        let mut consumer = state
            .channel
            .basic_consume(
                topic,
                &format!("kitchen-orders-{topic}"),
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        drop(guard);

        let topic = topic.to_string();
        tokio::spawn(async move {
            tracing::info!(topic = %topic, "RabbitMQ worker started");
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => {
                        tracing::info!(topic = %topic, "RabbitMQ worker cancelled");
                        break;
                    }
                    delivery = consumer.next() => {
                        let Some(delivery) = delivery else {
                            tracing::info!(topic = %topic, "Delivery channel closed, worker exiting");
                            break;
                        };
                        match delivery {
                            Ok(delivery) => Self::process_delivery(&handler, delivery).await,
                            Err(e) => {
                                tracing::error!(topic = %topic, error = %e, "Consumer stream error");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn start(&self, _ctx: CancellationToken) -> Result<()> {
        let guard = self.state.lock().await;
        guard.as_ref().context("RabbitMQ broker is not connected")?;
        tracing::info!("RabbitMQ broker started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let guard = self.state.lock().await;
        if let Some(state) = guard.as_ref() {
            // Closing the channel ends every consumer stream, which makes the
            // workers exit through their delivery-channel-closed branch.
            if let Err(e) = state.channel.close(200, "stopping").await {
                tracing::warn!(error = %e, "Channel already closed");
            }
        }
        Ok(())
    }
}

/// Keep only string-typed header values; other AMQP attribute types are
/// intentionally dropped.
fn headers_from_field_table(table: &FieldTable) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (key, value) in table.inner() {
        if let AMQPValue::LongString(text) = value {
            headers.insert(
                key.as_str().to_string(),
                String::from_utf8_lossy(text.as_bytes()).into_owned(),
            );
        }
    }
    headers
}

// ============================================================================
// Unit Tests
// ============================================================================
