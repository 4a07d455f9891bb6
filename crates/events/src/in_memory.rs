//! In-memory message queue for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::time::{Instant, sleep};

use crate::queue::{Delivery, MessageConsumer, MessagePublisher, QueueError};

/// How often `receive` re-checks an empty queue while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct PendingMessage {
    receipt: String,
    body: JsonValue,
    attempt: u32,
}

/// A message that exhausted its delivery attempts.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub body: JsonValue,
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<PendingMessage>,
    inflight: HashMap<String, PendingMessage>,
    dead: Vec<DeadLetter>,
}

/// In-memory at-least-once queue.
///
/// - No IO; waiting is a polling loop
/// - Unacknowledged deliveries stay in-flight until `nack` or [`reclaim`]
/// - Messages past the attempt limit land in a per-queue dead-letter list
///
/// [`reclaim`]: InMemoryQueue::reclaim
#[derive(Debug)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    max_attempts: u32,
    next_receipt: AtomicU64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_attempts,
            next_receipt: AtomicU64::new(1),
        }
    }

    /// Move every in-flight delivery back to the ready queue.
    ///
    /// Simulates what a durable channel does when a consumer crashes
    /// without acknowledging: the visibility timeout elapses and the
    /// messages are handed out again.
    pub fn reclaim(&self, queue: &str) {
        let mut queues = self.queues.lock().expect("queue lock poisoned");
        if let Some(state) = queues.get_mut(queue) {
            let mut receipts: Vec<String> = state.inflight.keys().cloned().collect();
            receipts.sort();
            for receipt in receipts {
                if let Some(msg) = state.inflight.remove(&receipt) {
                    state.ready.push_back(msg);
                }
            }
        }
    }

    /// Messages that exhausted their delivery attempts.
    pub fn dead_letters(&self, queue: &str) -> Vec<DeadLetter> {
        let queues = self.queues.lock().expect("queue lock poisoned");
        queues
            .get(queue)
            .map(|state| state.dead.clone())
            .unwrap_or_default()
    }

    /// Number of messages waiting or in flight (dead letters excluded).
    pub fn depth(&self, queue: &str) -> usize {
        let queues = self.queues.lock().expect("queue lock poisoned");
        queues
            .get(queue)
            .map(|state| state.ready.len() + state.inflight.len())
            .unwrap_or(0)
    }

    fn try_receive(&self, queue: &str) -> Option<Delivery> {
        let mut queues = self.queues.lock().expect("queue lock poisoned");
        let state = queues.entry(queue.to_string()).or_default();

        while let Some(mut msg) = state.ready.pop_front() {
            msg.attempt += 1;
            if msg.attempt > self.max_attempts {
                state.dead.push(DeadLetter {
                    body: msg.body,
                    attempts: msg.attempt - 1,
                });
                continue;
            }

            let delivery = Delivery {
                receipt: msg.receipt.clone(),
                body: msg.body.clone(),
                attempt: msg.attempt,
            };
            state.inflight.insert(msg.receipt.clone(), msg);
            return Some(delivery);
        }

        None
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryQueue {
    async fn publish(&self, queue: &str, body: JsonValue) -> Result<(), QueueError> {
        let receipt = self.next_receipt.fetch_add(1, Ordering::Relaxed).to_string();

        let mut queues = self.queues.lock().expect("queue lock poisoned");
        let state = queues.entry(queue.to_string()).or_default();
        state.ready.push_back(PendingMessage {
            receipt,
            body,
            attempt: 0,
        });
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for InMemoryQueue {
    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(delivery) = self.try_receive(queue) {
                return Ok(Some(delivery));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().expect("queue lock poisoned");
        if let Some(state) = queues.get_mut(queue) {
            state.inflight.remove(&delivery.receipt);
        }
        Ok(())
    }

    async fn nack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().expect("queue lock poisoned");
        if let Some(state) = queues.get_mut(queue) {
            if let Some(msg) = state.inflight.remove(&delivery.receipt) {
                state.ready.push_back(msg);
            }
        }
        Ok(())
    }
}
