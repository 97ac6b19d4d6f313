use std::sync::Arc;

use anyhow::Result;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::gateway::{KitchenOrderDataSource, OrderStatusDataSource};
use crate::messaging::{Message, MessageBroker, MessageHandler};
use crate::usecase::{CreateKitchenOrderInput, KitchenOrderController};

// ============================================================================
// Kitchen Order Consumer
// ============================================================================
//
// Binds the use cases to the command topics. Each handler:
// 1. decodes the command payload (decode failure short-circuits: no use case
//    is invoked and no reply is published)
// 2. invokes the matching use case
// 3. publishes a correlated response envelope when the inbound message
//    carried a reply-to header (best-effort)
// 4. returns the use-case result to the broker, which drives the
//    ack/nack/delete decision
//
// ============================================================================

pub const TOPIC_CREATE: &str = "kitchen-order.create";
pub const TOPIC_UPDATE: &str = "kitchen-order.update";

const REPLY_TO_HEADER: &str = "reply-to";
const CORRELATION_ID_HEADER: &str = "correlation-id";

#[derive(Debug, Deserialize)]
struct CreateOrderPayload {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateOrderPayload {
    id: String,
    status_id: String,
}

#[derive(Debug, Serialize)]
struct ResponseEnvelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ResponseEnvelope {
    fn from_result<T: Serialize>(result: &Result<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: serde_json::to_value(data).ok(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

pub struct KitchenOrderConsumer {
    controller: Arc<KitchenOrderController>,
    broker: Arc<dyn MessageBroker>,
}

impl KitchenOrderConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        orders: Arc<dyn KitchenOrderDataSource>,
        statuses: Arc<dyn OrderStatusDataSource>,
    ) -> Self {
        Self {
            controller: Arc::new(KitchenOrderController::new(orders, statuses)),
            broker,
        }
    }

    /// Subscribe both command handlers. The first subscribe failure aborts;
    /// the second subscription is not attempted.
    pub async fn start(&self, ctx: CancellationToken) -> Result<()> {
        let create_handler = Self::create_handler(self.controller.clone(), self.broker.clone());
        self.broker
            .subscribe(ctx.clone(), TOPIC_CREATE, create_handler)
            .await?;

        let update_handler = Self::update_handler(self.controller.clone(), self.broker.clone());
        self.broker
            .subscribe(ctx, TOPIC_UPDATE, update_handler)
            .await?;

        tracing::info!(
            topics = ?[TOPIC_CREATE, TOPIC_UPDATE],
            "Kitchen order consumer started"
        );
        Ok(())
    }

    fn create_handler(
        controller: Arc<KitchenOrderController>,
        broker: Arc<dyn MessageBroker>,
    ) -> MessageHandler {
        Arc::new(move |message| {
            let controller = controller.clone();
            let broker = broker.clone();
            async move { Self::handle_create(controller, broker, message).await }.boxed()
        })
    }

    fn update_handler(
        controller: Arc<KitchenOrderController>,
        broker: Arc<dyn MessageBroker>,
    ) -> MessageHandler {
        Arc::new(move |message| {
            let controller = controller.clone();
            let broker = broker.clone();
            async move { Self::handle_update(controller, broker, message).await }.boxed()
        })
    }

    async fn handle_create(
        controller: Arc<KitchenOrderController>,
        broker: Arc<dyn MessageBroker>,
        message: Message,
    ) -> Result<()> {
        let payload: CreateOrderPayload = match serde_json::from_slice(&message.body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(message_id = %message.id, error = %e, "Undecodable create command");
                return Err(e.into());
            }
        };

        tracing::debug!(
            message_id = %message.id,
            order_id = %payload.order_id,
            "Handling kitchen order create command"
        );

        let result = controller
            .create_order(CreateKitchenOrderInput {
                order_id: payload.order_id,
                customer_id: None,
                items: vec![],
            })
            .await;

        Self::reply(&broker, &message, &result).await;
        result.map(|_| ())
    }

    async fn handle_update(
        controller: Arc<KitchenOrderController>,
        broker: Arc<dyn MessageBroker>,
        message: Message,
    ) -> Result<()> {
        let payload: UpdateOrderPayload = match serde_json::from_slice(&message.body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(message_id = %message.id, error = %e, "Undecodable update command");
                return Err(e.into());
            }
        };

        tracing::debug!(
            message_id = %message.id,
            kitchen_order_id = %payload.id,
            status_id = %payload.status_id,
            "Handling kitchen order update command"
        );

        let result = controller
            .update_order(&payload.id, &payload.status_id)
            .await;

        Self::reply(&broker, &message, &result).await;
        result.map(|_| ())
    }

    /// Publish the response envelope to the inbound reply-to topic, if any.
    /// Best-effort: a publish failure is logged and does not change the
    /// result handed back to the broker.
    async fn reply<T: Serialize>(
        broker: &Arc<dyn MessageBroker>,
        inbound: &Message,
        result: &Result<T>,
    ) {
        let Some(reply_to) = inbound.headers.get(REPLY_TO_HEADER) else {
            return;
        };

        let envelope = ResponseEnvelope::from_result(result);
        let body = match serde_json::to_vec(&envelope) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(message_id = %inbound.id, error = %e, "Could not encode reply");
                return;
            }
        };

        let response = Message::new(Uuid::new_v4().to_string(), body)
            .with_header(CORRELATION_ID_HEADER, inbound.id.clone());

        if let Err(e) = broker.publish(reply_to, response).await {
            tracing::warn!(
                message_id = %inbound.id,
                reply_to = %reply_to,
                error = %e,
                "Failed to publish reply"
            );
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::status_id;
    use crate::gateway::{InMemoryKitchenOrderDataSource, InMemoryOrderStatusDataSource};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Broker double that records publishes and lets tests push deliveries
    /// through the registered handlers.
    #[derive(Default)]
    struct RecordingBroker {
        handlers: Mutex<HashMap<String, MessageHandler>>,
        published: Mutex<Vec<(String, Message)>>,
    }

    impl RecordingBroker {
        async fn deliver(&self, topic: &str, message: Message) -> Result<()> {
            let handler = self
                .handlers
                .lock()
                .await
                .get(topic)
                .cloned()
                .expect("no handler registered for topic");
            handler(message).await
        }

        async fn published(&self) -> Vec<(String, Message)> {
            self.published.lock().await.clone()
        }
    }

    #[async_trait]
    impl MessageBroker for RecordingBroker {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        async fn publish(&self, topic: &str, message: Message) -> Result<()> {
            self.published
                .lock()
                .await
                .push((topic.to_string(), message));
            Ok(())
        }

        async fn subscribe(
            &self,
            _ctx: CancellationToken,
            topic: &str,
            handler: MessageHandler,
        ) -> Result<()> {
            self.handlers
                .lock()
                .await
                .insert(topic.to_string(), handler);
            Ok(())
        }

        async fn start(&self, _ctx: CancellationToken) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    async fn started_consumer() -> (KitchenOrderConsumer, Arc<RecordingBroker>) {
        let broker = Arc::new(RecordingBroker::default());
        let consumer = KitchenOrderConsumer::new(
            broker.clone(),
            Arc::new(InMemoryKitchenOrderDataSource::new()),
            Arc::new(InMemoryOrderStatusDataSource::seeded()),
        );
        consumer.start(CancellationToken::new()).await.unwrap();
        (consumer, broker)
    }

    #[tokio::test]
    async fn test_create_publishes_correlated_reply() {
        let (_consumer, broker) = started_consumer().await;

        let inbound = Message::new("msg-1", br#"{"order_id":"O1"}"#.to_vec())
            .with_header(REPLY_TO_HEADER, "kitchen-order.reply");

        broker.deliver(TOPIC_CREATE, inbound).await.unwrap();

        let published = broker.published().await;
        assert_eq!(published.len(), 1);

        let (topic, reply) = &published[0];
        assert_eq!(topic, "kitchen-order.reply");
        assert_eq!(
            reply.headers.get(CORRELATION_ID_HEADER).map(String::as_str),
            Some("msg-1")
        );

        let envelope: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["data"]["slug"], "001");
        assert_eq!(envelope["data"]["status"]["id"], status_id::RECEIVED);
        assert!(envelope.get("error").is_none());
    }

    #[tokio::test]
    async fn test_create_without_reply_to_publishes_nothing() {
        let (_consumer, broker) = started_consumer().await;

        let inbound = Message::new("msg-1", br#"{"order_id":"O1"}"#.to_vec());
        broker.deliver(TOPIC_CREATE, inbound).await.unwrap();

        assert!(broker.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_short_circuits() {
        let (_consumer, broker) = started_consumer().await;

        let inbound = Message::new("msg-1", b"not json".to_vec())
            .with_header(REPLY_TO_HEADER, "kitchen-order.reply");

        let result = broker.deliver(TOPIC_CREATE, inbound).await;

        // The decode error is returned to the broker and no reply goes out.
        assert!(result.is_err());
        assert!(broker.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let (_consumer, broker) = started_consumer().await;

        let create = Message::new("msg-1", br#"{"order_id":"O1"}"#.to_vec())
            .with_header(REPLY_TO_HEADER, "kitchen-order.reply");
        broker.deliver(TOPIC_CREATE, create).await.unwrap();

        let created: serde_json::Value =
            serde_json::from_slice(&broker.published().await[0].1.body).unwrap();
        let kitchen_order_id = created["data"]["id"].as_str().unwrap().to_string();

        let update_body = serde_json::json!({
            "id": kitchen_order_id,
            "status_id": status_id::PREPARING,
        });
        let update = Message::new("msg-2", update_body.to_string().into_bytes())
            .with_header(REPLY_TO_HEADER, "kitchen-order.reply");
        broker.deliver(TOPIC_UPDATE, update).await.unwrap();

        let published = broker.published().await;
        assert_eq!(published.len(), 2);

        let envelope: serde_json::Value = serde_json::from_slice(&published[1].1.body).unwrap();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["data"]["status"]["id"], status_id::PREPARING);
        assert!(!envelope["data"]["updated_at"].is_null());
    }

    #[tokio::test]
    async fn test_update_failure_returns_error_and_error_envelope() {
        let (_consumer, broker) = started_consumer().await;

        let update_body = serde_json::json!({
            "id": "no-such-order",
            "status_id": status_id::PREPARING,
        });
        let update = Message::new("msg-1", update_body.to_string().into_bytes())
            .with_header(REPLY_TO_HEADER, "kitchen-order.reply");

        let result = broker.deliver(TOPIC_UPDATE, update).await;
        assert!(result.is_err());

        let published = broker.published().await;
        assert_eq!(published.len(), 1);

        let envelope: serde_json::Value = serde_json::from_slice(&published[0].1.body).unwrap();
        assert_eq!(envelope["success"], false);
        assert!(envelope["error"].as_str().unwrap().contains("not found"));
        assert!(envelope.get("data").is_none());
    }

    #[tokio::test]
    async fn test_start_aborts_on_first_subscribe_failure() {
        struct FailingBroker {
            attempts: AtomicUsize,
        }

        #[async_trait]
        impl MessageBroker for FailingBroker {
            async fn connect(&self) -> Result<()> {
                Ok(())
            }

            async fn close(&self) -> Result<()> {
                Ok(())
            }

            async fn publish(&self, _topic: &str, _message: Message) -> Result<()> {
                Ok(())
            }

            async fn subscribe(
                &self,
                _ctx: CancellationToken,
                _topic: &str,
                _handler: MessageHandler,
            ) -> Result<()> {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("subscribe refused")
            }

            async fn start(&self, _ctx: CancellationToken) -> Result<()> {
                Ok(())
            }

            async fn stop(&self) -> Result<()> {
                Ok(())
            }
        }

        let broker = Arc::new(FailingBroker {
            attempts: AtomicUsize::new(0),
        });
        let consumer = KitchenOrderConsumer::new(
            broker.clone(),
            Arc::new(InMemoryKitchenOrderDataSource::new()),
            Arc::new(InMemoryOrderStatusDataSource::seeded()),
        );

        let result = consumer.start(CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(broker.attempts.load(Ordering::SeqCst), 1);
    }
}
