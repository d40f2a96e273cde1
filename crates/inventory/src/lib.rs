//! Inventory domain module.
//!
//! This crate contains business rules for products and stock on hand,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    DEFAULT_LOW_STOCK_THRESHOLD, MAX_STOCK, NewProduct, Product, ProductDraft, StockError,
};
