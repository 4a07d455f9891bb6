//! Background worker hosting the product-change consumer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use ecomm_cart::{CartService, CartStore};
use ecomm_events::{Delivery, MessageConsumer, ProductChanged};

/// How long a single `receive` blocks before the loop re-checks shutdown.
const TICK: Duration = Duration::from_millis(250);

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// The worker stops taking new deliveries, finishes the in-flight
    /// fan-out, then exits.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// The product-change consumer loop.
///
/// - Receives `ProductChanged` events from the channel
/// - Fans each one out to every cart via [`CartService::apply_product_change`]
/// - Acknowledges only after all affected carts are durably written
/// - Leaves failed deliveries unacknowledged so the channel redelivers them
#[derive(Debug)]
pub struct ProductChangeWorker;

impl ProductChangeWorker {
    /// Spawn the worker task. Runs until the handle requests shutdown.
    pub fn spawn<S, C>(
        queue: impl Into<String>,
        consumer: C,
        carts: Arc<CartService<S>>,
    ) -> WorkerHandle
    where
        S: CartStore + 'static,
        C: MessageConsumer + 'static,
    {
        let queue = queue.into();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(worker_loop(queue, consumer, carts, shutdown_rx));

        WorkerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

async fn worker_loop<S, C>(
    queue: String,
    consumer: C,
    carts: Arc<CartService<S>>,
    shutdown: watch::Receiver<bool>,
) where
    S: CartStore,
    C: MessageConsumer,
{
    info!(queue = %queue, "product change worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match consumer.receive(&queue, TICK).await {
            Ok(Some(delivery)) => handle_delivery(&queue, &consumer, &carts, delivery).await,
            Ok(None) => continue,
            Err(err) => {
                warn!(queue = %queue, error = %err, "receive failed");
                tokio::time::sleep(TICK).await;
            }
        }
    }

    info!(queue = %queue, "product change worker stopped");
}

async fn handle_delivery<S, C>(
    queue: &str,
    consumer: &C,
    carts: &CartService<S>,
    delivery: Delivery,
) where
    S: CartStore,
    C: MessageConsumer,
{
    let change = match serde_json::from_value::<ProductChanged>(delivery.body.clone()) {
        Ok(change) => change,
        Err(err) => {
            warn!(
                queue = %queue,
                receipt = %delivery.receipt,
                attempt = delivery.attempt,
                error = %err,
                "undecodable product change event"
            );
            // Bounded by the channel's delivery limit, then dead-lettered.
            if let Err(err) = consumer.nack(queue, &delivery).await {
                warn!(queue = %queue, error = %err, "nack failed");
            }
            return;
        }
    };

    match carts.apply_product_change(&change).await {
        Ok(updated) => {
            info!(
                queue = %queue,
                product_id = %change.id,
                carts_updated = updated,
                "applied product change"
            );
            // Ack only now: every affected cart has been written.
            if let Err(err) = consumer.ack(queue, &delivery).await {
                warn!(
                    queue = %queue,
                    receipt = %delivery.receipt,
                    error = %err,
                    "ack failed; the event will be redelivered"
                );
            }
        }
        Err(err) => {
            warn!(
                queue = %queue,
                product_id = %change.id,
                attempt = delivery.attempt,
                error = %err,
                "failed to apply product change; leaving the event for redelivery"
            );
            if let Err(err) = consumer.nack(queue, &delivery).await {
                warn!(queue = %queue, error = %err, "nack failed");
            }
        }
    }
}
