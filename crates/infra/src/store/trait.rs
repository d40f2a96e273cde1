use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use tillpoint_auth::{OtpChallenge, User};
use tillpoint_core::{CustomerId, ProductId, SaleId, UserId};
use tillpoint_customers::Customer;
use tillpoint_inventory::Product;
use tillpoint_sales::{NewSale, SaleRecord, SalesSummary};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Unique or referential constraint (duplicate email, record still referenced by sales).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn product_not_found(id: ProductId) -> Self {
        Self::NotFound(format!("product {id}"))
    }

    pub fn customer_not_found(id: CustomerId) -> Self {
        Self::NotFound(format!("customer {id}"))
    }

    pub fn user_not_found(id: UserId) -> Self {
        Self::NotFound(format!("user {id}"))
    }
}

/// Outcome of a guarded stock decrement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecrementError {
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error("decrement would leave negative stock ({available} available)")]
    WouldGoNegative { available: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Newest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Products with `quantity <= threshold`, lowest stock first.
    async fn low_stock(&self, threshold: u32) -> Result<Vec<Product>, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError>;

    async fn create_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn update_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Fails with `Conflict` while any ledger row references the product.
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, StoreError>;

    async fn create_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    /// Fails with `Conflict` while any ledger row references the customer.
    async fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError>;
}

/// Append-only sales ledger plus its read views.
#[async_trait]
pub trait SalesLedger: Send + Sync {
    /// Open the atomic unit a checkout runs in.
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, StoreError>;

    /// Every sale line, newest first, joined with product and customer names.
    async fn list_sales(&self) -> Result<Vec<SaleRecord>, StoreError>;

    /// Totals over sale lines whose UTC date is `date`.
    async fn summary_for_date(&self, date: NaiveDate) -> Result<SalesSummary, StoreError>;
}

/// One checkout's transaction.
///
/// Nothing done through it is visible to other readers until `commit`.
/// Dropping it without committing discards every change.
#[async_trait]
pub trait CheckoutTx: Send {
    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    /// Load and lock the given products. Missing ids are simply absent from
    /// the result. Callers pass ids in ascending order.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    async fn decrement_quantity(&mut self, id: ProductId, amount: u32) -> Result<(), DecrementError>;

    async fn append_sale(&mut self, sale: NewSale) -> Result<SaleId, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Writes name, email, role and password hash.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;

    /// Replace (or clear) the pending login code.
    async fn set_otp(&self, id: UserId, otp: Option<OtpChallenge>) -> Result<(), StoreError>;

    /// Count one guess against the pending code, atomically.
    ///
    /// Returns the challenge with the guess already counted, or `None` when no
    /// code is pending or its attempts are used up. Concurrent guesses each
    /// consume an attempt, so the limit holds under parallel requests.
    async fn claim_otp_attempt(&self, id: UserId) -> Result<Option<OtpChallenge>, StoreError>;
}
