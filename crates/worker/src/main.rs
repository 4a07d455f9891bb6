//! Cart-side worker: hosts the product-change consumer.
//!
//! Configuration comes from the environment:
//!
//! - `CART_STORE_URL` — `postgres://...` for the document store, anything
//!   else is treated as a SQLite file path (default `carts.db`)
//! - `REDIS_URL` — channel endpoint (default `redis://127.0.0.1:6379`)
//! - `PRODUCT_CHANGED_QUEUE` — stream name (default `product-changed`)
//! - `QUEUE_CONSUMER_NAME` — consumer name within the group (defaults to a
//!   per-process name)
//! - `RUST_LOG` — log filter (default `info`)

use std::sync::Arc;

use ecomm_cart::{CartService, CartStore};
use ecomm_infra::{PostgresCartStore, ProductChangeWorker, RedisStreamsQueue, SqliteCartStore};

const CONSUMER_GROUP: &str = "cart-service";

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| {
        tracing::warn!("{name} not set; using {default}");
        default.to_string()
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ecomm_observability::init();

    let store_url = env_or("CART_STORE_URL", "carts.db");
    let redis_url = env_or("REDIS_URL", "redis://127.0.0.1:6379");
    let queue = env_or("PRODUCT_CHANGED_QUEUE", "product-changed");
    let consumer_name = std::env::var("QUEUE_CONSUMER_NAME")
        .unwrap_or_else(|_| format!("cart-worker-{}", std::process::id()));

    let store: Arc<dyn CartStore> =
        if store_url.starts_with("postgres://") || store_url.starts_with("postgresql://") {
            tracing::info!("using the PostgreSQL document store");
            Arc::new(PostgresCartStore::connect(&store_url).await?)
        } else {
            tracing::info!(path = %store_url, "using the embedded SQLite store");
            Arc::new(SqliteCartStore::connect(&store_url).await?)
        };
    let carts = Arc::new(CartService::new(store));

    let channel = RedisStreamsQueue::connect(&redis_url, CONSUMER_GROUP, &consumer_name).await?;
    let worker = ProductChangeWorker::spawn(queue, channel, carts);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested; draining the in-flight delivery");
    worker.shutdown().await;

    Ok(())
}
