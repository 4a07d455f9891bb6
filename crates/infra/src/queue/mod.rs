//! Message channel backends.

#[cfg(feature = "redis")]
mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsQueue;
