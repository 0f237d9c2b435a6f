use crate::config::BrokerConfig;
use crate::domain::message::Message;
use crate::domain::update::{Update, UpdateEvent};
use crate::error::{AppError, Result};
use crate::proto;
use async_trait::async_trait;
use opentelemetry::{KeyValue, global, metrics::Counter};
use prost::Message as _;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ordered-by-key message broker the updates are published to.
#[async_trait]
pub trait UpdateBroker: Send + Sync + std::fmt::Debug {
    /// Publishes one entry and returns once the broker has acknowledged it.
    ///
    /// # Errors
    /// Returns an error if the broker rejects the entry or is unreachable.
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> anyhow::Result<()>;

    /// # Errors
    /// Returns an error if the broker is unreachable.
    async fn ping(&self) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
struct Metrics {
    published_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("chat-service");
        Self {
            published_total: meter
                .u64_counter("chat_updates_published_total")
                .with_description("Total update publish attempts by kind and outcome")
                .build(),
        }
    }
}

/// Serializes domain changes into update envelopes and publishes them keyed by chat id.
///
/// Publishing is not part of the database transaction. An update published inside a unit of
/// work that later rolls back stays published, and a failed publish after a commit is not
/// retried here: delivery is at-least-once at best, never exactly-once.
#[derive(Clone, Debug)]
pub struct UpdatePublisher {
    broker: Arc<dyn UpdateBroker>,
    topic: String,
    timeout: Duration,
    metrics: Metrics,
}

impl UpdatePublisher {
    #[must_use]
    pub fn new(broker: Arc<dyn UpdateBroker>, config: &BrokerConfig) -> Self {
        Self {
            broker,
            topic: config.updates_topic.clone(),
            timeout: Duration::from_millis(config.publish_timeout_ms),
            metrics: Metrics::new(),
        }
    }

    /// Encodes `update` and publishes it under its chat id.
    ///
    /// # Errors
    /// Returns `AppError::Broker` if the broker fails.
    /// Returns `AppError::Timeout` if the broker does not acknowledge in time.
    #[tracing::instrument(
        level = "debug",
        skip(self, update),
        fields(kind = update.event.kind(), chat_id = %update.event.chat_id(), audience = update.audience.len())
    )]
    pub async fn publish(&self, update: &Update) -> Result<()> {
        let key = update.event.chat_id().to_string();
        let payload = proto::Update::from(update).encode_to_vec();
        let kind = KeyValue::new("kind", update.event.kind());

        let result = match tokio::time::timeout(self.timeout, self.broker.publish(&self.topic, &key, payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AppError::Broker(e)),
            Err(_) => Err(AppError::Timeout),
        };

        let status = if result.is_ok() { "success" } else { "failure" };
        self.metrics.published_total.add(1, &[kind, KeyValue::new("status", status)]);
        result
    }

    /// # Errors
    /// See [`UpdatePublisher::publish`].
    pub async fn chat_created(
        &self,
        timestamp: OffsetDateTime,
        audience: &[Uuid],
        chat_id: Uuid,
        is_direct: bool,
        members: &[Uuid],
    ) -> Result<()> {
        self.publish(&Update {
            timestamp,
            audience: audience.to_vec(),
            event: UpdateEvent::ChatCreated { chat_id, is_direct, members: members.to_vec() },
        })
        .await
    }

    /// # Errors
    /// See [`UpdatePublisher::publish`].
    pub async fn message_sent(&self, timestamp: OffsetDateTime, audience: &[Uuid], message: &Message) -> Result<()> {
        self.publish(&Update {
            timestamp,
            audience: audience.to_vec(),
            event: UpdateEvent::MessageSent {
                message_id: message.message_id,
                chat_id: message.chat_id,
                from_user: message.from_user,
                text: message.text.clone(),
                reply_to: message.reply_to,
                attachments: message.attachments.clone(),
            },
        })
        .await
    }

    /// # Errors
    /// See [`UpdatePublisher::publish`].
    pub async fn member_added(
        &self,
        timestamp: OffsetDateTime,
        audience: &[Uuid],
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        self.publish(&Update {
            timestamp,
            audience: audience.to_vec(),
            event: UpdateEvent::MemberAdded { chat_id, user_id },
        })
        .await
    }

    /// # Errors
    /// See [`UpdatePublisher::publish`].
    pub async fn member_removed(
        &self,
        timestamp: OffsetDateTime,
        audience: &[Uuid],
        chat_id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        self.publish(&Update {
            timestamp,
            audience: audience.to_vec(),
            event: UpdateEvent::MemberRemoved { chat_id, user_id },
        })
        .await
    }
}
