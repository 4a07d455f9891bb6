//! Integration tests for the full change-propagation pipeline.
//!
//! Publish → channel → worker → fan-out → store, over the in-memory
//! backends. Asynchronous effects are asserted with bounded polling.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::{Instant, sleep};

use ecomm_cart::{CartItem, CartService, InMemoryCartStore};
use ecomm_core::{CartId, ProductId};
use ecomm_events::{InMemoryQueue, MessagePublisher, ProductChanged};

use crate::worker::ProductChangeWorker;

const QUEUE: &str = "product-changed";
const DEADLINE: Duration = Duration::from_secs(5);

fn product_id(value: i64) -> ProductId {
    ProductId::new(value).unwrap()
}

fn item(id: i64, name: &str, price_cents: u64, quantity: u32) -> CartItem {
    CartItem::new(product_id(id), name, price_cents, quantity).unwrap()
}

async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + DEADLINE;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn published_change_reaches_every_matching_cart() {
    let store = Arc::new(InMemoryCartStore::new());
    let service = Arc::new(CartService::new(store.clone()));
    let queue = Arc::new(InMemoryQueue::new());

    let cart_a = CartId::new();
    let cart_b = CartId::new();
    service.add_item(cart_a, item(1, "Widget", 999, 2)).await.unwrap();
    service.add_item(cart_b, item(1, "Widget", 999, 1)).await.unwrap();
    service.add_item(cart_b, item(2, "Gadget", 500, 1)).await.unwrap();

    let worker = ProductChangeWorker::spawn(QUEUE, queue.clone(), service.clone());

    let event = ProductChanged {
        id: product_id(1),
        name: "Widget v2".to_string(),
        image_url: Some("https://cdn.example.com/v2.png".to_string()),
        price_cents: 1200,
    };
    queue
        .publish(QUEUE, serde_json::to_value(&event).unwrap())
        .await
        .unwrap();

    // Acknowledged only after the fan-out, so a drained queue means every
    // affected cart has been written.
    let drained = eventually(|| {
        let queue = queue.clone();
        async move { queue.depth(QUEUE) == 0 }
    })
    .await;
    assert!(drained, "event was not acknowledged within the deadline");

    let items_a = service.get_items(cart_a).await.unwrap().unwrap();
    assert_eq!(items_a[0].name(), "Widget v2");
    assert_eq!(items_a[0].image_uri(), Some("https://cdn.example.com/v2.png"));
    assert_eq!(items_a[0].quantity(), 2);

    let items_b = service.get_items(cart_b).await.unwrap().unwrap();
    let widget = items_b.iter().find(|i| i.id() == product_id(1)).unwrap();
    assert_eq!(widget.price_cents(), 1200);
    assert_eq!(widget.quantity(), 1);
    let gadget = items_b.iter().find(|i| i.id() == product_id(2)).unwrap();
    assert_eq!(gadget.name(), "Gadget");

    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_event_is_idempotent() {
    let store = Arc::new(InMemoryCartStore::new());
    let service = Arc::new(CartService::new(store.clone()));
    let queue = Arc::new(InMemoryQueue::new());

    let cart_id = CartId::new();
    service.add_item(cart_id, item(1, "Widget", 999, 2)).await.unwrap();

    let worker = ProductChangeWorker::spawn(QUEUE, queue.clone(), service.clone());

    let event = ProductChanged {
        id: product_id(1),
        name: "Widget v2".to_string(),
        image_url: None,
        price_cents: 1200,
    };
    let body = serde_json::to_value(&event).unwrap();
    // At-least-once delivery: the same event arrives twice.
    queue.publish(QUEUE, body.clone()).await.unwrap();
    queue.publish(QUEUE, body).await.unwrap();

    let drained = eventually(|| {
        let queue = queue.clone();
        async move { queue.depth(QUEUE) == 0 }
    })
    .await;
    assert!(drained);

    let items = service.get_items(cart_id).await.unwrap().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name(), "Widget v2");
    assert_eq!(items[0].price_cents(), 1200);
    assert_eq!(items[0].quantity(), 2);

    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn poison_message_is_dead_lettered_and_the_worker_survives() {
    let store = Arc::new(InMemoryCartStore::new());
    let service = Arc::new(CartService::new(store.clone()));
    let queue = Arc::new(InMemoryQueue::with_max_attempts(2));

    let cart_id = CartId::new();
    service.add_item(cart_id, item(1, "Widget", 999, 1)).await.unwrap();

    let worker = ProductChangeWorker::spawn(QUEUE, queue.clone(), service.clone());

    // Not a ProductChanged event at all.
    queue.publish(QUEUE, json!({"garbage": true})).await.unwrap();

    let dead = eventually(|| {
        let queue = queue.clone();
        async move { queue.dead_letters(QUEUE).len() == 1 }
    })
    .await;
    assert!(dead, "poison message never reached the dead-letter list");

    // The worker keeps processing well-formed events afterwards.
    let event = ProductChanged {
        id: product_id(1),
        name: "Widget v2".to_string(),
        image_url: None,
        price_cents: 1500,
    };
    queue
        .publish(QUEUE, serde_json::to_value(&event).unwrap())
        .await
        .unwrap();

    let applied = eventually(|| {
        let service = service.clone();
        async move {
            let items = service.get_items(cart_id).await.unwrap().unwrap();
            items[0].price_cents() == 1500
        }
    })
    .await;
    assert!(applied);

    worker.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_graceful_and_prompt() {
    let service = Arc::new(CartService::new(InMemoryCartStore::new()));
    let queue = Arc::new(InMemoryQueue::new());

    let worker = ProductChangeWorker::spawn(QUEUE, queue, service);

    // Must come back well within the test harness timeout.
    tokio::time::timeout(Duration::from_secs(2), worker.shutdown())
        .await
        .expect("worker did not shut down in time");
}
