//! Customers domain module.
//!
//! Contact records for the people a sale is made to, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod customer;

pub use customer::{Customer, CustomerDraft, NewCustomer};
