//! Catalog product entity.

use ecomm_core::validate::{ensure_http_url, ensure_plain_text};
use ecomm_core::{DomainError, DomainResult, ProductId};

/// A catalog product.
///
/// Field validation mirrors what the cart copies: the name is bounded plain
/// text, the image an absolute http(s) URL. `price_cents` is in minor
/// currency units; `stock` is the sellable amount and stays positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    description: Option<String>,
    image: Option<String>,
    price_cents: u64,
    stock: u32,
}

const NAME_MAX: usize = 50;

impl Product {
    pub fn new(
        id: ProductId,
        name: impl AsRef<str>,
        price_cents: u64,
        stock: u32,
    ) -> DomainResult<Self> {
        let mut product = Self {
            id,
            name: String::new(),
            description: None,
            image: None,
            price_cents,
            stock: 1,
        };
        product.set_name(name.as_ref())?;
        product.set_stock(stock)?;
        Ok(product)
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn set_name(&mut self, name: &str) -> DomainResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if name.chars().count() > NAME_MAX {
            return Err(DomainError::validation(format!(
                "name must be at most {NAME_MAX} characters"
            )));
        }
        ensure_plain_text(name, "name")?;
        self.name = name.to_string();
        Ok(())
    }

    /// Free text; blank normalizes to absent.
    pub fn set_description(&mut self, description: Option<&str>) {
        self.description = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
    }

    /// Absolute http(s) URL; blank normalizes to absent.
    pub fn set_image(&mut self, image: Option<&str>) -> DomainResult<()> {
        self.image = match image {
            None => None,
            Some(value) if value.trim().is_empty() => None,
            Some(value) => {
                ensure_http_url(value, "image")?;
                Some(value.to_string())
            }
        };
        Ok(())
    }

    pub fn set_price_cents(&mut self, price_cents: u64) {
        self.price_cents = price_cents;
    }

    pub fn set_stock(&mut self, stock: u32) -> DomainResult<()> {
        if stock == 0 {
            return Err(DomainError::validation("stock must be positive"));
        }
        self.stock = stock;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_id(value: i64) -> ProductId {
        ProductId::new(value).unwrap()
    }

    #[test]
    fn new_product_trims_and_keeps_the_name() {
        let product = Product::new(product_id(1), " Widget ", 999, 10).unwrap();
        assert_eq!(product.name(), "Widget");
    }

    #[test]
    fn name_is_bounded_to_fifty_characters() {
        let long = "x".repeat(51);
        assert!(Product::new(product_id(1), long, 999, 10).is_err());

        let exactly = "x".repeat(50);
        assert!(Product::new(product_id(1), exactly, 999, 10).is_ok());
    }

    #[test]
    fn name_must_be_plain_text() {
        assert!(Product::new(product_id(1), "<i>Widget</i>", 999, 10).is_err());
        assert!(Product::new(product_id(1), "Widget\u{0000}", 999, 10).is_err());
    }

    #[test]
    fn stock_must_be_positive() {
        assert!(Product::new(product_id(1), "Widget", 999, 0).is_err());
    }

    #[test]
    fn blank_description_and_image_normalize_to_absent() {
        let mut product = Product::new(product_id(1), "Widget", 999, 10).unwrap();

        product.set_description(Some("  "));
        assert_eq!(product.description(), None);

        product.set_image(Some("")).unwrap();
        assert_eq!(product.image(), None);
    }

    #[test]
    fn image_must_be_an_absolute_http_url() {
        let mut product = Product::new(product_id(1), "Widget", 999, 10).unwrap();
        assert!(product.set_image(Some("images/w.png")).is_err());
        assert!(
            product
                .set_image(Some("https://cdn.example.com/w.png"))
                .is_ok()
        );
    }
}
