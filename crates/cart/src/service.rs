//! Cart aggregate service.
//!
//! Implements add-item / get-items / remove-item and the product-change
//! fan-out against a [`CartStore`], enforcing the read-modify-write
//! discipline: the store contract has no concurrency token, so every
//! mutation of a cart happens under that cart's lock. The synchronous path
//! and the asynchronous consumer path share the same service instance and
//! therefore the same locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::TryStreamExt;
use thiserror::Error;
use tracing::{debug, instrument};

use ecomm_core::{CartId, ProductId};
use ecomm_events::ProductChanged;

use crate::cart::Cart;
use crate::item::CartItem;
use crate::store::{CartStore, StoreError};

/// Cart operation error.
///
/// `NotFound` never appears here: a missing cart or item is an `Ok` outcome
/// (`None` / `false`), and no backend error type leaks past this boundary.
#[derive(Debug, Error)]
pub enum CartError {
    /// Malformed caller input. Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store failed; the caller decides whether to retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-cart-id mutual exclusion.
///
/// Each cart id gets its own async mutex, created on first use. Holding the
/// lock across a `get` + `put` pair makes the pair effectively atomic with
/// respect to every other writer in this process.
#[derive(Debug, Default)]
struct CartLocks {
    locks: Mutex<HashMap<CartId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CartLocks {
    fn lock_for(&self, id: CartId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("cart lock table poisoned");
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// The cart aggregate service.
///
/// Owns the store handle and the per-cart locks; constructed once at
/// startup and shared (`Arc`) between the request path and the consumer.
#[derive(Debug)]
pub struct CartService<S> {
    store: S,
    locks: CartLocks,
}

impl<S> CartService<S>
where
    S: CartStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: CartLocks::default(),
        }
    }

    /// Add an item to the cart, creating the cart if this is its first
    /// item. Duplicate item ids are allowed to coexist.
    #[instrument(skip(self, item), fields(cart_id = %cart_id, product_id = %item.id()), err)]
    pub async fn add_item(&self, cart_id: CartId, item: CartItem) -> Result<(), CartError> {
        ensure_cart_id(cart_id)?;

        let lock = self.locks.lock_for(cart_id);
        let _guard = lock.lock().await;

        let cart = match self.store.get(cart_id).await? {
            Some(mut cart) => {
                cart.add_item(item);
                cart
            }
            None => Cart::new(cart_id, item),
        };
        self.store.put(&cart).await?;
        Ok(())
    }

    /// The cart's items, or `None` if no such cart exists. An existing cart
    /// with zero items yields `Some(vec![])` — callers can tell the two
    /// apart.
    #[instrument(skip(self), fields(cart_id = %cart_id), err)]
    pub async fn get_items(&self, cart_id: CartId) -> Result<Option<Vec<CartItem>>, CartError> {
        ensure_cart_id(cart_id)?;
        let cart = self.store.get(cart_id).await?;
        Ok(cart.map(Cart::into_items))
    }

    /// Remove the first item with the given id. Returns `false` — and
    /// performs no write — when the cart or the item does not exist.
    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %item_id), err)]
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: ProductId,
    ) -> Result<bool, CartError> {
        ensure_cart_id(cart_id)?;

        let lock = self.locks.lock_for(cart_id);
        let _guard = lock.lock().await;

        let Some(mut cart) = self.store.get(cart_id).await? else {
            return Ok(false);
        };
        if !cart.remove_item(item_id) {
            return Ok(false);
        }
        self.store.put(&cart).await?;
        Ok(true)
    }

    /// Fan a product change out to every cart referencing the product.
    ///
    /// Scans all carts and rewrites the matching line items with the
    /// event's values. Each affected cart is re-read under its lock before
    /// being modified — the scan snapshot may be stale by the time the cart
    /// is written. Idempotent: carts already carrying the event's values
    /// are not written at all.
    ///
    /// Returns the number of carts written. Not atomic across carts; a
    /// failure part-way leaves earlier carts updated, which heals on
    /// redelivery.
    #[instrument(skip(self, change), fields(product_id = %change.id), err)]
    pub async fn apply_product_change(&self, change: &ProductChanged) -> Result<u64, CartError> {
        // First pass: collect the ids of affected carts, then drop the scan
        // so its store resources are released before any writes happen.
        let mut affected = Vec::new();
        {
            let mut carts = self.store.scan();
            while let Some(cart) = carts.try_next().await? {
                if cart.contains(change.id) {
                    affected.push(cart.id());
                }
            }
        }

        let mut updated = 0u64;
        for cart_id in affected {
            let lock = self.locks.lock_for(cart_id);
            let _guard = lock.lock().await;

            let Some(mut cart) = self.store.get(cart_id).await? else {
                continue;
            };
            let modified = cart
                .apply_product_change(change)
                .map_err(|e| CartError::InvalidArgument(e.to_string()))?;
            if modified {
                self.store.put(&cart).await?;
                updated += 1;
            }
        }

        debug!(product_id = %change.id, carts_updated = updated, "product change applied");
        Ok(updated)
    }
}

fn ensure_cart_id(cart_id: CartId) -> Result<(), CartError> {
    if cart_id.is_nil() {
        return Err(CartError::InvalidArgument(
            "cart id must not be nil".to_string(),
        ));
    }
    Ok(())
}
