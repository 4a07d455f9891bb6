//! Message-channel abstraction (mechanics only).
//!
//! The channel is **transport-agnostic** and makes minimal assumptions:
//!
//! - **At-least-once delivery**: a delivery that is not acknowledged comes
//!   back; consumers must be idempotent.
//! - **No cross-message ordering guarantees**.
//! - **Bounded retries**: implementations route a delivery to a dead-letter
//!   destination once its attempt count passes their limit, instead of
//!   redelivering forever.
//!
//! The consumer side is a pull interface (`receive`/`ack`/`nack`) so the
//! hosting worker owns its loop and can observe shutdown between messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Channel operation error.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection failure: {0}")]
    Connection(String),

    #[error("queue command failed: {0}")]
    Command(String),

    #[error("message serialization failed: {0}")]
    Serialization(String),

    #[error("message deserialization failed: {0}")]
    Deserialization(String),
}

/// A message handed to a consumer, together with its redelivery accounting.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Transport-level handle used to acknowledge this delivery.
    pub receipt: String,
    /// Decoded JSON body of the message.
    pub body: JsonValue,
    /// How many times this message has been handed out, this delivery
    /// included. Starts at 1.
    pub attempt: u32,
}

/// Producer side of the channel.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Enqueue a message on the named queue.
    async fn publish(&self, queue: &str, body: JsonValue) -> Result<(), QueueError>;
}

/// Consumer side of the channel.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait up to `wait` for the next delivery. `Ok(None)` means the wait
    /// elapsed without a message — not an error.
    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Mark a delivery as processed. Only acknowledged deliveries are
    /// removed from the channel; everything else is eventually redelivered.
    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError>;

    /// Give a delivery back for redelivery (processing failed).
    async fn nack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError>;
}

#[async_trait]
impl<P> MessagePublisher for Arc<P>
where
    P: MessagePublisher + ?Sized,
{
    async fn publish(&self, queue: &str, body: JsonValue) -> Result<(), QueueError> {
        (**self).publish(queue, body).await
    }
}

#[async_trait]
impl<C> MessageConsumer for Arc<C>
where
    C: MessageConsumer + ?Sized,
{
    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        (**self).receive(queue, wait).await
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(queue, delivery).await
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).nack(queue, delivery).await
    }
}
