//! Catalog domain module.
//!
//! The catalog owns product data; the only piece with algorithmic content
//! here is the change publisher in [`ProductService::update`], which
//! notifies the cart side when a product's cart-visible attributes change.
//! Relational persistence (categories, SQL repositories) is out of scope;
//! hosts implement [`ProductRepository`] against whatever they store
//! products in.

pub mod product;
pub mod repository;
pub mod service;

pub use product::Product;
pub use repository::{InMemoryProductRepository, ProductRepository, RepositoryError};
pub use service::{CatalogError, ProductService};
