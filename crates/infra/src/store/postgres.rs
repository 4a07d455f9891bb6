//! PostgreSQL-backed cart store (remote document-store backend).
//!
//! Carts live in a single table as JSONB documents keyed by UUID. The
//! connection pool is thread-safe and shared process-wide; all operations
//! are single statements, so `put` is atomic for its key.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::instrument;
use uuid::Uuid;

use ecomm_cart::{Cart, CartStore, StoreError};
use ecomm_core::CartId;

use super::map_sqlx_error;

#[derive(Debug, Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    /// Connect to the database at `url` and bootstrap the carts table.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: PgPool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS carts (
                id UUID PRIMARY KEY,
                document JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn decode_row(row: Result<PgRow, sqlx::Error>) -> Result<Cart, StoreError> {
    let row = row.map_err(|e| map_sqlx_error("scan", e))?;
    let document: serde_json::Value = row
        .try_get("document")
        .map_err(|e| map_sqlx_error("scan", e))?;
    serde_json::from_value(document).map_err(|e| StoreError::Corrupt(format!("decode cart: {e}")))
}

#[async_trait]
impl CartStore for PostgresCartStore {
    #[instrument(skip(self), fields(cart_id = %id), err)]
    async fn get(&self, id: CartId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query("SELECT document FROM carts WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            Some(row) => {
                let document: serde_json::Value = row
                    .try_get("document")
                    .map_err(|e| map_sqlx_error("get", e))?;
                let cart = serde_json::from_value(document)
                    .map_err(|e| StoreError::Corrupt(format!("decode cart: {e}")))?;
                Ok(Some(cart))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, cart), fields(cart_id = %cart.id()), err)]
    async fn put(&self, cart: &Cart) -> Result<(), StoreError> {
        let document = serde_json::to_value(cart)
            .map_err(|e| StoreError::Corrupt(format!("encode cart: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO carts (id, document)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document
            "#,
        )
        .bind(Uuid::from(cart.id()))
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
