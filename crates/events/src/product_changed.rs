//! The "product changed" integration event.

use serde::{Deserialize, Serialize};

use ecomm_core::ProductId;

/// Notification that a catalog product's cart-visible attributes changed.
///
/// Carries the **new authoritative values**, not a diff. The JSON body on
/// the wire is:
///
/// ```json
/// { "id": 1, "name": "Widget v2", "imageUrl": null, "price": 1200 }
/// ```
///
/// `price` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductChanged {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "price")]
    pub price_cents: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_matches_the_queue_contract() {
        let event = ProductChanged {
            id: ProductId::new(1).unwrap(),
            name: "Widget v2".to_string(),
            image_url: None,
            price_cents: 1200,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "name": "Widget v2",
                "imageUrl": null,
                "price": 1200,
            })
        );
    }

    #[test]
    fn deserialization_rejects_non_positive_product_id() {
        let body = serde_json::json!({
            "id": 0,
            "name": "Widget",
            "imageUrl": null,
            "price": 100,
        });
        assert!(serde_json::from_value::<ProductChanged>(body).is_err());
    }
}
