// ============================================================================
// Messaging Layer - Broker Abstraction
// ============================================================================
//
// A transport-agnostic pub/sub contract with two interchangeable backends:
// - RabbitMQ (exchange/queue, manual ack/nack)
// - SQS (long-poll/delete, SNS envelope unwrap)
//
// Delivery semantics are at-least-once: a delivered message is acknowledged
// (RabbitMQ ack / SQS delete) only when the handler returns Ok. On handler
// error the message is made available for redelivery through the backend's
// own mechanism. Handlers must be idempotent.
//
// ============================================================================

pub mod rabbitmq;
pub mod sqs;

pub use rabbitmq::RabbitMqBroker;
pub use sqs::SqsBroker;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, BrokerKind};

/// Broker-level message envelope. Not a domain type: the body is opaque
/// bytes and the headers are whatever string-typed attributes survived the
/// transport decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Message {
    pub fn new(id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            body,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Handler invoked for each delivered message. The returned result drives
/// the backend's ack/nack/delete decision.
pub type MessageHandler =
    Arc<dyn Fn(Message) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Pub/sub contract implemented by every backend.
///
/// Guarantees required of implementations:
/// - `subscribe` is non-blocking: it registers a background worker and
///   returns immediately.
/// - Each delivered message is acknowledged only if the handler returns Ok;
///   on error the message must become redeliverable.
/// - Independent `subscribe` calls coexist and run concurrently.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn publish(&self, topic: &str, message: Message) -> Result<()>;

    async fn subscribe(
        &self,
        ctx: CancellationToken,
        topic: &str,
        handler: MessageHandler,
    ) -> Result<()>;

    async fn start(&self, ctx: CancellationToken) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// Select the broker backend at startup. The rest of the system only ever
/// sees `Arc<dyn MessageBroker>`.
pub fn build_broker(config: &AppConfig) -> Arc<dyn MessageBroker> {
    match config.broker {
        BrokerKind::RabbitMq => Arc::new(RabbitMqBroker::new(config.rabbitmq.clone())),
        BrokerKind::Sqs => Arc::new(SqsBroker::new(config.sqs.clone())),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder_collects_headers() {
        let msg = Message::new("m-1", b"payload".to_vec())
            .with_header("reply-to", "replies")
            .with_header("content-type", "application/json");

        assert_eq!(msg.id, "m-1");
        assert_eq!(msg.headers.len(), 2);
        assert_eq!(msg.headers.get("reply-to").map(String::as_str), Some("replies"));
    }

    #[test]
    fn test_build_broker_honors_configured_kind() {
        let mut config = AppConfig::default();

        config.broker = BrokerKind::RabbitMq;
        build_broker(&config);

        config.broker = BrokerKind::Sqs;
        build_broker(&config);
    }
}
