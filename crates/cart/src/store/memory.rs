//! In-memory cart store.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use ecomm_core::CartId;

use super::{CartStore, StoreError};
use crate::cart::Cart;

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<HashMap<CartId, Cart>>,
    puts: AtomicU64,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls so far. Lets tests assert that a failed
    /// operation performed no write.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn cart_count(&self) -> usize {
        self.carts.read().expect("store lock poisoned").len()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        let carts = self.carts.read().expect("store lock poisoned");
        Ok(carts.get(&id).cloned())
    }

    async fn put(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut carts = self.carts.write().expect("store lock poisoned");
        carts.insert(cart.id(), cart.clone());
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn scan(&self) -> BoxStream<'_, Result<Cart, StoreError>> {
        // Point-in-time snapshot; weakly consistent by contract.
        let snapshot: Vec<Cart> = {
            let carts = self.carts.read().expect("store lock poisoned");
            carts.values().cloned().collect()
        };
        futures::stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::CartItem;
    use ecomm_core::ProductId;
    use futures::TryStreamExt;

    fn cart_with_item(product: i64) -> Cart {
        Cart::new(
            CartId::new(),
            CartItem::new(ProductId::new(product).unwrap(), "Widget", 100, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let store = InMemoryCartStore::new();
        assert!(store.get(CartId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_inserts_then_replaces() {
        let store = InMemoryCartStore::new();
        let mut cart = cart_with_item(1);
        store.put(&cart).await.unwrap();

        cart.add_item(CartItem::new(ProductId::new(2).unwrap(), "Gadget", 50, 1).unwrap());
        store.put(&cart).await.unwrap();

        let stored = store.get(cart.id()).await.unwrap().unwrap();
        assert_eq!(stored.items().len(), 2);
        assert_eq!(store.put_count(), 2);
    }

    #[tokio::test]
    async fn scan_yields_every_cart() {
        let store = InMemoryCartStore::new();
        store.put(&cart_with_item(1)).await.unwrap();
        store.put(&cart_with_item(2)).await.unwrap();

        let carts: Vec<Cart> = store.scan().try_collect().await.unwrap();
        assert_eq!(carts.len(), 2);
    }
}
