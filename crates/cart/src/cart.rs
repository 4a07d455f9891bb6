//! Aggregate root: Cart.

use serde::{Deserialize, Serialize};

use ecomm_core::{CartId, DomainResult, ProductId};
use ecomm_events::ProductChanged;

use crate::item::CartItem;

/// A customer's cart and its items, treated as one consistency unit.
///
/// The id is immutable once created. Item order is not significant. Adding
/// does not deduplicate item ids; removal takes the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    items: Vec<CartItem>,
}

impl Cart {
    /// Carts come into existence with their first item.
    pub fn new(id: CartId, first_item: CartItem) -> Self {
        Self {
            id,
            items: vec![first_item],
        }
    }

    /// An empty cart is a valid state (everything removed), it is just
    /// never how a cart starts.
    pub fn empty(id: CartId) -> Self {
        Self { id, items: Vec::new() }
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item_id: ProductId) -> bool {
        self.items.iter().any(|item| item.id() == item_id)
    }

    pub fn add_item(&mut self, item: CartItem) {
        self.items.push(item);
    }

    /// Remove the first item with the given id. Returns whether a matching
    /// item existed.
    pub fn remove_item(&mut self, item_id: ProductId) -> bool {
        match self.items.iter().position(|item| item.id() == item_id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Apply a product change to every matching item. Returns whether any
    /// item was actually modified.
    pub fn apply_product_change(&mut self, change: &ProductChanged) -> DomainResult<bool> {
        let mut changed = false;
        for item in self.items.iter_mut().filter(|item| item.id() == change.id) {
            if item.apply_product_change(change)? {
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecomm_core::ProductId;

    fn item(id: i64, name: &str) -> CartItem {
        CartItem::new(ProductId::new(id).unwrap(), name, 100, 1).unwrap()
    }

    #[test]
    fn new_cart_holds_exactly_the_first_item() {
        let cart = Cart::new(CartId::new(), item(1, "Widget"));
        assert_eq!(cart.items().len(), 1);
        assert!(!cart.is_empty());
    }

    #[test]
    fn an_empty_cart_is_a_valid_state() {
        let id = CartId::new();
        let cart = Cart::empty(id);
        assert!(cart.is_empty());
        assert_eq!(cart.id(), id);
        assert!(!cart.contains(ProductId::new(1).unwrap()));
    }

    #[test]
    fn add_item_does_not_deduplicate() {
        let mut cart = Cart::new(CartId::new(), item(1, "Widget"));
        cart.add_item(item(1, "Widget"));
        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn remove_item_takes_the_first_match_only() {
        let mut cart = Cart::new(CartId::new(), item(1, "Widget"));
        cart.add_item(item(1, "Widget"));
        cart.add_item(item(2, "Gadget"));

        assert!(cart.remove_item(ProductId::new(1).unwrap()));
        assert_eq!(cart.items().len(), 2);
        assert!(cart.contains(ProductId::new(1).unwrap()));

        assert!(cart.remove_item(ProductId::new(1).unwrap()));
        assert!(!cart.contains(ProductId::new(1).unwrap()));
    }

    #[test]
    fn remove_missing_item_reports_false() {
        let mut cart = Cart::new(CartId::new(), item(1, "Widget"));
        assert!(!cart.remove_item(ProductId::new(9).unwrap()));
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn apply_product_change_touches_only_matching_items() {
        let mut cart = Cart::new(CartId::new(), item(1, "Widget"));
        cart.add_item(item(2, "Gadget"));
        cart.add_item(item(1, "Widget"));

        let change = ProductChanged {
            id: ProductId::new(1).unwrap(),
            name: "Widget v2".to_string(),
            image_url: None,
            price_cents: 1200,
        };

        assert!(cart.apply_product_change(&change).unwrap());
        let names: Vec<&str> = cart.items().iter().map(CartItem::name).collect();
        assert_eq!(names, vec!["Widget v2", "Gadget", "Widget v2"]);
    }
}
