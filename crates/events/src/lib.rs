//! Integration events and the message-channel contract.
//!
//! The channel is at-least-once: a delivery that is never acknowledged is
//! handed out again, so every consumer of these types must be idempotent.

pub mod in_memory;
pub mod product_changed;
pub mod queue;

pub use in_memory::InMemoryQueue;
pub use product_changed::ProductChanged;
pub use queue::{Delivery, MessageConsumer, MessagePublisher, QueueError};
