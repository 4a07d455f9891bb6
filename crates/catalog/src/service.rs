//! Product application service, including the change publisher.

use thiserror::Error;
use tracing::{debug, instrument};

use ecomm_core::ProductId;
use ecomm_events::{MessagePublisher, ProductChanged, QueueError};

use crate::product::Product;
use crate::repository::{ProductRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The product write committed but the change notification did not go
    /// out. The caller decides what to do; the stores will reconcile on the
    /// next successful change to the same product.
    #[error("product change notification failed: {0}")]
    Publish(#[source] QueueError),
}

/// Catalog product service.
///
/// `update` is the Product-Change Publisher: it compares the previous
/// stored values of name, image and price against the new ones and emits a
/// [`ProductChanged`] event only when at least one of them differs.
#[derive(Debug)]
pub struct ProductService<R, P> {
    repository: R,
    publisher: P,
    queue: String,
}

impl<R, P> ProductService<R, P>
where
    R: ProductRepository,
    P: MessagePublisher,
{
    pub fn new(repository: R, publisher: P, queue: impl Into<String>) -> Self {
        Self {
            repository,
            publisher,
            queue: queue.into(),
        }
    }

    pub async fn add(&self, product: Product) -> Result<(), CatalogError> {
        self.repository.add(&product).await?;
        Ok(())
    }

    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.repository.get(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.repository.list().await?)
    }

    pub async fn delete(&self, id: ProductId) -> Result<bool, CatalogError> {
        Ok(self.repository.delete(id).await?)
    }

    /// Persist the update, then notify the cart side if a cart-visible
    /// field changed.
    ///
    /// The notification is best-effort and non-transactional: by the time
    /// publishing fails the catalog write has already committed, so the
    /// failure is surfaced rather than rolled back.
    #[instrument(skip(self, product), fields(product_id = %product.id()), err)]
    pub async fn update(&self, product: Product) -> Result<(), CatalogError> {
        let previous = self.repository.get(product.id()).await?;
        self.repository.update(&product).await?;

        let Some(previous) = previous else {
            return Ok(());
        };

        let cart_visible_change = previous.name() != product.name()
            || previous.image() != product.image()
            || previous.price_cents() != product.price_cents();
        if !cart_visible_change {
            return Ok(());
        }

        let event = ProductChanged {
            id: product.id(),
            name: product.name().to_string(),
            image_url: product.image().map(str::to_string),
            price_cents: product.price_cents(),
        };
        let body = serde_json::to_value(&event)
            .map_err(|e| CatalogError::Publish(QueueError::Serialization(e.to_string())))?;

        debug!(product_id = %product.id(), queue = %self.queue, "publishing product change");
        self.publisher
            .publish(&self.queue, body)
            .await
            .map_err(CatalogError::Publish)?;
        Ok(())
    }
}
