use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tillpoint_core::{CustomerId, DomainError, DomainResult, Money, ProductId, ValueObject};
use tillpoint_inventory::Product;

/// Why a checkout was rejected.
///
/// Every variant is raised before commit, so the store is left exactly as it
/// was before the checkout started.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Malformed request: no lines, or a non-positive quantity.
    #[error("invalid line item: {0}")]
    InvalidLineItem(String),

    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: u32,
        requested: u32,
    },

    /// The backing store failed; the transaction was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// One (product, quantity) pair of a checkout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Validated checkout input. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    customer_id: CustomerId,
    lines: Vec<CheckoutLine>,
}

impl CheckoutRequest {
    /// Validate raw lines as submitted by the till.
    ///
    /// Quantities arrive signed so that zero and negative values can be
    /// reported as `InvalidLineItem` instead of failing deserialization.
    pub fn new(
        customer_id: CustomerId,
        lines: impl IntoIterator<Item = (ProductId, i64)>,
    ) -> Result<Self, CheckoutError> {
        let mut validated = Vec::new();
        for (idx, (product_id, quantity)) in lines.into_iter().enumerate() {
            if quantity <= 0 {
                return Err(CheckoutError::InvalidLineItem(format!(
                    "line {}: quantity must be positive (got {quantity})",
                    idx + 1
                )));
            }
            let quantity = u32::try_from(quantity).map_err(|_| {
                CheckoutError::InvalidLineItem(format!(
                    "line {}: quantity {quantity} is too large",
                    idx + 1
                ))
            })?;
            validated.push(CheckoutLine {
                product_id,
                quantity,
            });
        }

        if validated.is_empty() {
            return Err(CheckoutError::InvalidLineItem(
                "checkout needs at least one item".to_string(),
            ));
        }

        Ok(Self {
            customer_id,
            lines: validated,
        })
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[CheckoutLine] {
        &self.lines
    }

    /// Distinct products referenced by the request, in ascending id order.
    ///
    /// Stores lock rows in this order so concurrent checkouts cannot deadlock.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// A line that passed validation, priced at the current unit price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// The full decision for one checkout: every line resolved, stock-checked and priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    customer_id: CustomerId,
    lines: Vec<PlannedLine>,
    total: Money,
}

impl CheckoutPlan {
    /// Walk the request in input order against a snapshot of the (locked) products.
    ///
    /// A product repeated on several lines is checked against what remains
    /// after the earlier lines.
    pub fn build(
        request: &CheckoutRequest,
        products: &HashMap<ProductId, Product>,
    ) -> Result<Self, CheckoutError> {
        let mut remaining: HashMap<ProductId, u32> = HashMap::new();
        let mut lines = Vec::with_capacity(request.lines().len());
        let mut total = Money::ZERO;

        for (idx, line) in request.lines().iter().enumerate() {
            let product = products
                .get(&line.product_id)
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;

            let available = remaining
                .entry(product.id)
                .or_insert(product.quantity);
            if line.quantity > *available {
                return Err(CheckoutError::InsufficientStock {
                    product: product.name.clone(),
                    available: *available,
                    requested: line.quantity,
                });
            }
            *available -= line.quantity;

            let out_of_range = |e: DomainError| {
                CheckoutError::InvalidLineItem(format!("line {}: {e}", idx + 1))
            };
            let line_total = product.unit_price.times(line.quantity).map_err(out_of_range)?;
            total = total.checked_add(line_total).map_err(out_of_range)?;

            lines.push(PlannedLine {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.unit_price,
                line_total,
            });
        }

        Ok(Self {
            customer_id: request.customer_id(),
            lines,
            total,
        })
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[PlannedLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn receipt(&self) -> CheckoutReceipt {
        CheckoutReceipt {
            items: self
                .lines
                .iter()
                .map(|l| ReceiptLine {
                    name: l.name.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    line_total: l.line_total,
                })
                .collect(),
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl ValueObject for ReceiptLine {}

/// Summary of a completed checkout, returned to the till and mailed to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub items: Vec<ReceiptLine>,
    pub total: Money,
}

impl CheckoutReceipt {
    /// Receipt for already priced lines; fails if the grand total is out of range.
    pub fn from_lines(items: Vec<ReceiptLine>) -> DomainResult<Self> {
        let total = Money::total(items.iter().map(|l| l.line_total))?;
        Ok(Self { items, total })
    }
}
