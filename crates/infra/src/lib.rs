//! Infrastructure backends for the cart/catalog subsystem.
//!
//! Two interchangeable cart stores (an embedded single-file SQLite store
//! and a PostgreSQL document store), the Redis Streams message channel, and
//! the background worker hosting the product-change consumer.

pub mod queue;
pub mod store;
pub mod worker;

#[cfg(test)]
mod integration_tests;

pub use store::{PostgresCartStore, SqliteCartStore};
pub use worker::{ProductChangeWorker, WorkerHandle};

#[cfg(feature = "redis")]
pub use queue::RedisStreamsQueue;
