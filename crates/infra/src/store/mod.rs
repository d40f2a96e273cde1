//! Persistence boundary for products, customers, the sales ledger and staff.
//!
//! Two backends implement the same traits: [`InMemoryStore`] for dev/tests
//! and [`PostgresStore`] for production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{
    CheckoutTx, CustomerStore, DecrementError, ProductStore, SalesLedger, StoreError, UserStore,
};
