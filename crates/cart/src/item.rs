//! Cart line item (value object).

use serde::{Deserialize, Serialize};

use ecomm_core::validate::{ensure_http_url, ensure_plain_text};
use ecomm_core::{DomainError, DomainResult, ProductId};
use ecomm_events::ProductChanged;

/// A single line in a cart.
///
/// Identified by the catalog product id. Every field is validated on
/// construction, on assignment and on deserialization — an invalid value
/// never enters the aggregate.
///
/// `price_cents` is the price in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCartItem")]
pub struct CartItem {
    id: ProductId,
    name: String,
    image_uri: Option<String>,
    image_alt_text: Option<String>,
    price_cents: u64,
    quantity: u32,
}

impl CartItem {
    pub fn new(
        id: ProductId,
        name: impl AsRef<str>,
        price_cents: u64,
        quantity: u32,
    ) -> DomainResult<Self> {
        let mut item = Self {
            id,
            name: String::new(),
            image_uri: None,
            image_alt_text: None,
            price_cents,
            quantity: 1,
        };
        item.set_name(name.as_ref())?;
        item.set_quantity(quantity)?;
        Ok(item)
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_uri(&self) -> Option<&str> {
        self.image_uri.as_deref()
    }

    pub fn image_alt_text(&self) -> Option<&str> {
        self.image_alt_text.as_deref()
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Display name: trimmed, non-empty plain text.
    pub fn set_name(&mut self, name: &str) -> DomainResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        ensure_plain_text(name, "name")?;
        self.name = name.to_string();
        Ok(())
    }

    /// Absolute http(s) image URL; blank normalizes to absent.
    pub fn set_image_uri(&mut self, uri: Option<&str>) -> DomainResult<()> {
        self.image_uri = match uri {
            None => None,
            Some(value) if value.trim().is_empty() => None,
            Some(value) => {
                ensure_http_url(value, "image_uri")?;
                Some(value.to_string())
            }
        };
        Ok(())
    }

    /// Plain-text alt text; blank normalizes to absent.
    pub fn set_image_alt_text(&mut self, alt: Option<&str>) -> DomainResult<()> {
        self.image_alt_text = match alt.map(str::trim) {
            None => None,
            Some("") => None,
            Some(value) => {
                ensure_plain_text(value, "image_alt_text")?;
                Some(value.to_string())
            }
        };
        Ok(())
    }

    pub fn set_price_cents(&mut self, price_cents: u64) {
        self.price_cents = price_cents;
    }

    pub fn set_quantity(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.quantity = quantity;
        Ok(())
    }

    /// Overwrite the product-owned fields with the event's values.
    ///
    /// Quantity and alt text are untouched. Returns whether anything
    /// actually changed, so callers can skip the write for a re-delivered
    /// event (idempotent apply).
    pub fn apply_product_change(&mut self, change: &ProductChanged) -> DomainResult<bool> {
        debug_assert_eq!(self.id, change.id);

        let mut changed = false;

        if self.name != change.name.trim() {
            self.set_name(&change.name)?;
            changed = true;
        }

        let new_image = change
            .image_url
            .as_deref()
            .filter(|value| !value.trim().is_empty());
        if self.image_uri.as_deref() != new_image {
            self.set_image_uri(change.image_url.as_deref())?;
            changed = true;
        }

        if self.price_cents != change.price_cents {
            self.price_cents = change.price_cents;
            changed = true;
        }

        Ok(changed)
    }
}

/// Unvalidated mirror used to funnel deserialization through validation.
#[derive(Debug, Deserialize)]
struct RawCartItem {
    id: ProductId,
    name: String,
    #[serde(default)]
    image_uri: Option<String>,
    #[serde(default)]
    image_alt_text: Option<String>,
    price_cents: u64,
    quantity: u32,
}

impl TryFrom<RawCartItem> for CartItem {
    type Error = DomainError;

    fn try_from(raw: RawCartItem) -> Result<Self, Self::Error> {
        let mut item = CartItem::new(raw.id, raw.name, raw.price_cents, raw.quantity)?;
        item.set_image_uri(raw.image_uri.as_deref())?;
        item.set_image_alt_text(raw.image_alt_text.as_deref())?;
        Ok(item)
    }
}
