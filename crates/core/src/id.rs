//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a cart aggregate.
///
/// Opaque and immutable once a cart is created. The nil UUID is
/// representable (it can arrive over the wire) but is rejected as a caller
/// argument at the service boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(Uuid);

impl CartId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// True for the all-zero UUID, which never names a real cart.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for CartId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for CartId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<CartId> for Uuid {
    fn from(value: CartId) -> Self {
        value.0
    }
}

impl FromStr for CartId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("CartId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Identifier of a catalog product.
///
/// Also the identity of a cart line item. Strictly positive; the bound is
/// enforced at construction and at deserialization, so a zero or negative
/// product id is unrepresentable past this point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::invalid_id(format!(
                "ProductId must be positive, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ProductId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductId> for i64 {
    fn from(value: ProductId) -> Self {
        value.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_rejects_zero_and_negative() {
        assert!(matches!(ProductId::new(0), Err(DomainError::InvalidId(_))));
        assert!(matches!(ProductId::new(-7), Err(DomainError::InvalidId(_))));
        assert_eq!(ProductId::new(1).unwrap().get(), 1);
    }

    #[test]
    fn product_id_deserialization_validates() {
        let ok: ProductId = serde_json::from_str("42").unwrap();
        assert_eq!(ok.get(), 42);

        assert!(serde_json::from_str::<ProductId>("0").is_err());
        assert!(serde_json::from_str::<ProductId>("-1").is_err());
    }

    #[test]
    fn cart_id_nil_detection() {
        assert!(CartId::from_uuid(uuid::Uuid::nil()).is_nil());
        assert!(!CartId::new().is_nil());
    }

    #[test]
    fn cart_id_round_trips_through_str() {
        let id = CartId::new();
        let parsed: CartId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
