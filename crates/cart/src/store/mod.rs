//! Cart persistence contract.
//!
//! The store offers only per-key read/replace over whole cart documents:
//! no multi-document transactions, no concurrency token. Per-cart
//! serialization is the caller's job (see [`CartService`]); the store only
//! guarantees that a single `put` is atomic for its key — readers never see
//! a torn document.
//!
//! [`CartService`]: crate::service::CartService

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use ecomm_core::CartId;

use crate::cart::Cart;

pub use memory::InMemoryCartStore;

/// Store operation error.
///
/// Absence of a key is **not** an error; `get` expresses it as `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity, timeout or backend failure. Retryable by the caller.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// A stored document could not be decoded. Not retryable.
    #[error("stored cart document is corrupt: {0}")]
    Corrupt(String),
}

/// Uniform key-value access to cart aggregates, keyed by cart id.
///
/// Implementations must be safe for concurrent use; the store handle is
/// created once at startup and shared process-wide.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Current snapshot of the cart, or `None` for a missing key.
    async fn get(&self, id: CartId) -> Result<Option<Cart>, StoreError>;

    /// Insert if absent, otherwise fully replace the value at the key.
    async fn put(&self, cart: &Cart) -> Result<(), StoreError>;

    /// Lazily enumerate every stored cart.
    ///
    /// Weakly consistent: carts created while the scan runs may be missed
    /// or seen twice. Acceptable for the change fan-out, which is itself
    /// eventually consistent and idempotent. Each call starts a fresh scan.
    fn scan(&self) -> BoxStream<'_, Result<Cart, StoreError>>;
}

#[async_trait]
impl<S> CartStore for Arc<S>
where
    S: CartStore + ?Sized,
{
    async fn get(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        (**self).get(id).await
    }

    async fn put(&self, cart: &Cart) -> Result<(), StoreError> {
        (**self).put(cart).await
    }

    fn scan(&self) -> BoxStream<'_, Result<Cart, StoreError>> {
        (**self).scan()
    }
}
