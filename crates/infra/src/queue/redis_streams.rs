//! Redis Streams-backed message channel (durable, at-least-once delivery).
//!
//! - **Durable delivery**: entries persist until acknowledged (`XACK`)
//! - **At-least-once**: unacknowledged entries are reclaimed and handed out
//!   again once they have been idle past the configured threshold
//! - **Consumer groups**: one group per logical consuming service
//! - **Dead-letter handling**: entries past `max_deliveries`, and entries
//!   whose payload cannot be decoded, go to `<queue>:dlq`
//!
//! One instance is meant to serve one logical receiver per queue (the
//! blocking `XREADGROUP` shares the multiplexed connection); publishing is
//! safe from any task.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde_json::Value as JsonValue;
use tracing::{instrument, warn};

use ecomm_events::{Delivery, MessageConsumer, MessagePublisher, QueueError};

/// Default deliveries before an entry is routed to the DLQ.
const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Default idle time before an unacknowledged entry is redelivered.
const DEFAULT_MIN_IDLE: Duration = Duration::from_secs(60);

/// How many pending entries to inspect per receive.
const PENDING_BATCH: usize = 10;

#[derive(Debug, Clone)]
struct StreamEntry {
    id: String,
    fields: HashMap<String, String>,
}

/// Message channel over Redis Streams.
#[derive(Debug)]
pub struct RedisStreamsQueue {
    conn: MultiplexedConnection,
    group: String,
    consumer: String,
    max_deliveries: u32,
    min_idle: Duration,
    groups_ready: Mutex<HashSet<String>>,
}

impl RedisStreamsQueue {
    /// Connect to Redis at `url`.
    ///
    /// `group` is the consumer-group name of the consuming service;
    /// `consumer` names this process within the group.
    pub async fn connect(
        url: &str,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(url).map_err(|e| QueueError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            group: group.into(),
            consumer: consumer.into(),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            min_idle: DEFAULT_MIN_IDLE,
            groups_ready: Mutex::new(HashSet::new()),
        })
    }

    /// Override the redelivery policy.
    pub fn with_policy(mut self, max_deliveries: u32, min_idle: Duration) -> Self {
        self.max_deliveries = max_deliveries;
        self.min_idle = min_idle;
        self
    }

    fn dlq_key(queue: &str) -> String {
        format!("{queue}:dlq")
    }

    /// Ensure the consumer group exists (idempotent, cached per queue).
    async fn ensure_group(&self, queue: &str) -> Result<(), QueueError> {
        {
            let ready = self.groups_ready.lock().expect("group cache poisoned");
            if ready.contains(queue) {
                return Ok(());
            }
        }

        let mut conn = self.conn.clone();
        // "0" starts the group at the beginning of the stream; MKSTREAM
        // creates the stream if it does not exist yet.
        let created: Result<String, redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(queue)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(_) => {}
            Err(e) if e.to_string().contains("BUSYGROUP") => {}
            Err(e) => {
                return Err(QueueError::Command(format!("XGROUP CREATE failed: {e}")));
            }
        }

        self.groups_ready
            .lock()
            .expect("group cache poisoned")
            .insert(queue.to_string());
        Ok(())
    }

    /// Redeliver entries that have sat unacknowledged past the idle
    /// threshold, routing exhausted or undecodable ones to the DLQ.
    async fn claim_pending(&self, queue: &str) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();

        // (id, owning consumer, idle ms, delivery count) per entry.
        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(queue)
            .arg(&self.group)
            .arg("IDLE")
            .arg(self.min_idle.as_millis() as u64)
            .arg("-")
            .arg("+")
            .arg(PENDING_BATCH)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XPENDING failed: {e}")))?;

        for (id, _owner, _idle, deliveries) in pending {
            if deliveries as u32 >= self.max_deliveries {
                self.dead_letter(queue, &id, deliveries as u32, "delivery limit reached")
                    .await?;
                continue;
            }

            // XCLAIM hands the entry to this consumer and bumps its
            // delivery counter.
            let claimed: redis::Value = redis::cmd("XCLAIM")
                .arg(queue)
                .arg(&self.group)
                .arg(&self.consumer)
                .arg(self.min_idle.as_millis() as u64)
                .arg(&id)
                .query_async(&mut conn)
                .await
                .map_err(|e| QueueError::Command(format!("XCLAIM failed: {e}")))?;

            let Some(entry) = parse_entries(claimed)?.into_iter().next() else {
                // Another consumer claimed it first.
                continue;
            };

            match decode_entry(&entry, deliveries as u32 + 1) {
                Ok(delivery) => return Ok(Some(delivery)),
                Err(reason) => {
                    self.dead_letter(queue, &entry.id, deliveries as u32, &reason)
                        .await?;
                }
            }
        }

        Ok(None)
    }

    /// Block up to `wait` for a brand-new entry.
    async fn read_new(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.conn.clone();

        let reply: redis::Value = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(1usize)
            .arg("BLOCK")
            .arg(wait.as_millis() as u64)
            .arg("STREAMS")
            .arg(queue)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XREADGROUP failed: {e}")))?;

        // Nil means the block timed out with nothing to read.
        if matches!(reply, redis::Value::Nil) {
            return Ok(None);
        }

        let Some(entry) = parse_xread_reply(reply, queue)?.into_iter().next() else {
            return Ok(None);
        };

        match decode_entry(&entry, 1) {
            Ok(delivery) => Ok(Some(delivery)),
            Err(reason) => {
                // Poison at the edge: never decodable, so retrying is futile.
                self.dead_letter(queue, &entry.id, 1, &reason).await?;
                Ok(None)
            }
        }
    }

    /// Copy an entry to the dead-letter stream and acknowledge the
    /// original so it stops being redelivered.
    async fn dead_letter(
        &self,
        queue: &str,
        entry_id: &str,
        deliveries: u32,
        reason: &str,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();

        let range: redis::Value = redis::cmd("XRANGE")
            .arg(queue)
            .arg(entry_id)
            .arg(entry_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XRANGE failed: {e}")))?;

        let payload = parse_entries(range)?
            .into_iter()
            .next()
            .and_then(|entry| entry.fields.get("payload").cloned())
            .unwrap_or_default();

        let _: String = redis::cmd("XADD")
            .arg(Self::dlq_key(queue))
            .arg("*")
            .arg("original_id")
            .arg(entry_id)
            .arg("deliveries")
            .arg(deliveries.to_string())
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("reason")
            .arg(reason)
            .arg("payload")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("DLQ XADD failed: {e}")))?;

        let _: u64 = redis::cmd("XACK")
            .arg(queue)
            .arg(&self.group)
            .arg(entry_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XACK failed: {e}")))?;

        warn!(
            queue = %queue,
            entry_id = %entry_id,
            deliveries = deliveries,
            reason = %reason,
            "message routed to dead-letter stream"
        );
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for RedisStreamsQueue {
    #[instrument(skip(self, body), fields(queue = %queue), err)]
    async fn publish(&self, queue: &str, body: JsonValue) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("XADD")
            .arg(queue)
            .arg("*")
            .arg("payload")
            .arg(body.to_string())
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XADD failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for RedisStreamsQueue {
    async fn receive(&self, queue: &str, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        self.ensure_group(queue).await?;

        if let Some(delivery) = self.claim_pending(queue).await? {
            return Ok(Some(delivery));
        }
        self.read_new(queue, wait).await
    }

    async fn ack(&self, queue: &str, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("XACK")
            .arg(queue)
            .arg(&self.group)
            .arg(&delivery.receipt)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Command(format!("XACK failed: {e}")))?;
        Ok(())
    }

    async fn nack(&self, _queue: &str, _delivery: &Delivery) -> Result<(), QueueError> {
        // Leaving the entry pending is the redelivery mechanism: it gets
        // reclaimed once it has been idle past the threshold.
        Ok(())
    }
}

fn decode_entry(entry: &StreamEntry, attempt: u32) -> Result<Delivery, String> {
    let payload = entry
        .fields
        .get("payload")
        .ok_or_else(|| "missing payload field".to_string())?;
    let body: JsonValue =
        serde_json::from_str(payload).map_err(|e| format!("payload is not JSON: {e}"))?;
    Ok(Delivery {
        receipt: entry.id.clone(),
        body,
        attempt,
    })
}

/// Parse a flat entry list, as returned by `XCLAIM` and `XRANGE`.
///
/// Entry format: `[entry_id, [field, value, field, value, ...]]`.
fn parse_entries(value: redis::Value) -> Result<Vec<StreamEntry>, QueueError> {
    let entries = match value {
        redis::Value::Bulk(entries) => entries,
        redis::Value::Nil => return Ok(vec![]),
        other => {
            return Err(QueueError::Deserialization(format!(
                "unexpected stream reply: {other:?}"
            )));
        }
    };

    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let redis::Value::Bulk(parts) = entry else {
            return Err(QueueError::Deserialization(
                "stream entry is not an array".to_string(),
            ));
        };
        if parts.len() < 2 {
            return Err(QueueError::Deserialization(
                "stream entry is too short".to_string(),
            ));
        }

        let id = match &parts[0] {
            redis::Value::Data(data) => String::from_utf8_lossy(data).to_string(),
            _ => {
                return Err(QueueError::Deserialization(
                    "stream entry id is not a string".to_string(),
                ));
            }
        };

        let redis::Value::Bulk(raw_fields) = &parts[1] else {
            return Err(QueueError::Deserialization(
                "stream entry fields are not an array".to_string(),
            ));
        };

        let mut fields = HashMap::new();
        for pair in raw_fields.chunks(2) {
            if let [redis::Value::Data(key), redis::Value::Data(value)] = pair {
                fields.insert(
                    String::from_utf8_lossy(key).to_string(),
                    String::from_utf8_lossy(value).to_string(),
                );
            }
        }

        parsed.push(StreamEntry { id, fields });
    }

    Ok(parsed)
}

/// Parse an `XREADGROUP` reply down to the entries of `queue`.
///
/// Reply format: `[[stream_name, [entry, entry, ...]], ...]`.
fn parse_xread_reply(value: redis::Value, queue: &str) -> Result<Vec<StreamEntry>, QueueError> {
    let streams = match value {
        redis::Value::Bulk(streams) => streams,
        redis::Value::Nil => return Ok(vec![]),
        other => {
            return Err(QueueError::Deserialization(format!(
                "unexpected XREADGROUP reply: {other:?}"
            )));
        }
    };

    for stream in streams {
        let redis::Value::Bulk(parts) = stream else {
            continue;
        };
        if parts.len() < 2 {
            continue;
        }
        let name = match &parts[0] {
            redis::Value::Data(data) => String::from_utf8_lossy(data).to_string(),
            _ => continue,
        };
        if name == queue {
            return parse_entries(parts[1].clone());
        }
    }

    Ok(vec![])
}
