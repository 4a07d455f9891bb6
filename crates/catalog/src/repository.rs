//! Product persistence port.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use ecomm_core::ProductId;

use crate::product::Product;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("transient catalog store failure: {0}")]
    Transient(String),
}

/// What the catalog needs from product storage, without implementing it.
///
/// The relational implementation lives with the host; this crate ships only
/// the in-memory one for tests and local development.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn add(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Insert-or-replace by product id.
    async fn update(&self, product: &Product) -> Result<(), RepositoryError>;

    /// Returns whether a product existed under the id.
    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
impl<R> ProductRepository for Arc<R>
where
    R: ProductRepository + ?Sized,
{
    async fn add(&self, product: &Product) -> Result<(), RepositoryError> {
        (**self).add(product).await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        (**self).list().await
    }

    async fn update(&self, product: &Product) -> Result<(), RepositoryError> {
        (**self).update(product).await
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        (**self).delete(id).await
    }
}

/// In-memory product repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn add(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().expect("repository lock poisoned");
        products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().expect("repository lock poisoned");
        Ok(products.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().expect("repository lock poisoned");
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by_key(Product::id);
        Ok(all)
    }

    async fn update(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().expect("repository lock poisoned");
        products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().expect("repository lock poisoned");
        Ok(products.remove(&id).is_some())
    }
}
