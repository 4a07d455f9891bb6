//! Cart store backends.
//!
//! Both backends persist a cart as one JSON document keyed by the cart id,
//! so a `put` is a single-statement upsert — atomic for its key, which is
//! all the [`CartStore`] contract promises.
//!
//! [`CartStore`]: ecomm_cart::CartStore

mod postgres;
mod sqlite;

pub use postgres::PostgresCartStore;
pub use sqlite::SqliteCartStore;

use ecomm_cart::StoreError;

/// Map sqlx errors to the store error taxonomy.
///
/// Everything the driver reports is treated as transient from the caller's
/// point of view; only an undecodable stored document is `Corrupt`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{operation}: {err}"))
        }
        _ => StoreError::Transient(format!("{operation}: {err}")),
    }
}

fn encode_document(cart: &ecomm_cart::Cart) -> Result<String, StoreError> {
    serde_json::to_string(cart).map_err(|e| StoreError::Corrupt(format!("encode cart: {e}")))
}

fn decode_document(document: &str) -> Result<ecomm_cart::Cart, StoreError> {
    serde_json::from_str(document).map_err(|e| StoreError::Corrupt(format!("decode cart: {e}")))
}
