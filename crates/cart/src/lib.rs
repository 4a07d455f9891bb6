//! Cart domain module.
//!
//! The cart is the aggregate this whole subsystem protects: a collection of
//! line items mutated from two directions at once — the synchronous
//! add/get/remove path and the asynchronous product-change fan-out. Both
//! paths converge on [`CartService`], which serializes every
//! read-modify-write on the same cart.

pub mod cart;
pub mod item;
pub mod service;
pub mod store;

pub use cart::Cart;
pub use item::CartItem;
pub use service::{CartError, CartService};
pub use store::{CartStore, InMemoryCartStore, StoreError};
