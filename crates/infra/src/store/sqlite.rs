//! SQLite-backed cart store (embedded single-file backend).

use std::str::FromStr;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::instrument;

use ecomm_cart::{Cart, CartStore, StoreError};
use ecomm_core::CartId;

use super::{decode_document, encode_document, map_sqlx_error};

/// Cart store over a single SQLite database file.
///
/// Cart ids are stored as UUID strings, the aggregate as one JSON document
/// per row. SQLite serializes writers, so the per-key atomicity of `put`
/// comes for free.
#[derive(Debug, Clone)]
pub struct SqliteCartStore {
    pool: SqlitePool,
}

impl SqliteCartStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database, for tests and local experiments.
    ///
    /// Capped at one connection: every pooled connection to `:memory:`
    /// would otherwise get its own empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| map_sqlx_error("connect", e))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS carts (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn decode_row(row: Result<SqliteRow, sqlx::Error>) -> Result<Cart, StoreError> {
    let row = row.map_err(|e| map_sqlx_error("scan", e))?;
    let document: String = row.try_get("document").map_err(|e| map_sqlx_error("scan", e))?;
    decode_document(&document)
}

#[async_trait]
impl CartStore for SqliteCartStore {
    #[instrument(skip(self), fields(cart_id = %id), err)]
    async fn get(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query("SELECT document FROM carts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            Some(row) => {
                let document: String = row
                    .try_get("document")
                    .map_err(|e| map_sqlx_error("get", e))?;
                Ok(Some(decode_document(&document)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.id()), err)]
    async fn put(&self, cart: &Cart) -> Result<(), StoreError> {
        let document = encode_document(cart)?;
        sqlx::query(
            r#"
            INSERT INTO carts (id, document)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET document = excluded.document
            "#,
        )
        .bind(cart.id().to_string())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("put", e))?;
        Ok(())
    }

    fn scan(&self) -> BoxStream<'_, Result<Cart, StoreError>> {
        sqlx::query("SELECT document FROM carts")
            .fetch(&self.pool)
            .map(decode_row)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecomm_cart::CartItem;
    use ecomm_core::ProductId;
    use futures::TryStreamExt;

    fn cart(product: i64) -> Cart {
        Cart::new(
            CartId::new(),
            CartItem::new(ProductId::new(product).unwrap(), "Widget", 999, 2).unwrap(),
        )
    }

    #[tokio::test]
    async fn get_returns_none_for_a_missing_key() {
        let store = SqliteCartStore::in_memory().await.unwrap();
        assert!(store.get(CartId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_document() {
        let store = SqliteCartStore::in_memory().await.unwrap();
        let cart = cart(1);

        store.put(&cart).await.unwrap();
        let stored = store.get(cart.id()).await.unwrap().unwrap();
        assert_eq!(stored, cart);
    }

    #[tokio::test]
    async fn put_fully_replaces_the_prior_value() {
        let store = SqliteCartStore::in_memory().await.unwrap();
        let mut cart = cart(1);
        store.put(&cart).await.unwrap();

        assert!(cart.remove_item(ProductId::new(1).unwrap()));
        store.put(&cart).await.unwrap();

        let stored = store.get(cart.id()).await.unwrap().unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn scan_streams_every_stored_cart() {
        let store = SqliteCartStore::in_memory().await.unwrap();
        store.put(&cart(1)).await.unwrap();
        store.put(&cart(2)).await.unwrap();
        store.put(&cart(3)).await.unwrap();

        let carts: Vec<Cart> = store.scan().try_collect().await.unwrap();
        assert_eq!(carts.len(), 3);
    }
}
