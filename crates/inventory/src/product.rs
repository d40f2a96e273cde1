use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tillpoint_core::error::require_text;
use tillpoint_core::{DomainError, DomainResult, Entity, Money, ProductId};

/// Products at or below this many units are reported as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Largest on-hand quantity; stock is stored in a signed 32-bit column.
pub const MAX_STOCK: u32 = i32::MAX as u32;

/// Stock-level failure when taking units off the shelf.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    Insufficient {
        name: String,
        available: u32,
        requested: u32,
    },
}

/// Entity: Product (one inventory record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub supplier: String,
    /// Reference to an uploaded image (file name or URL); never interpreted here.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

impl Product {
    pub fn create(id: ProductId, new: NewProduct, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            category: new.category,
            quantity: new.quantity,
            unit_price: new.unit_price,
            supplier: new.supplier,
            image: new.image,
            created_at,
        }
    }

    /// Replace the editable fields. An absent image keeps the current one.
    pub fn revise(&mut self, changes: NewProduct) {
        self.name = changes.name;
        self.category = changes.category;
        self.quantity = changes.quantity;
        self.unit_price = changes.unit_price;
        self.supplier = changes.supplier;
        if changes.image.is_some() {
            self.image = changes.image;
        }
    }

    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.quantity <= threshold
    }

    /// Check that `requested` units can be taken without going negative.
    pub fn ensure_available(&self, requested: u32) -> Result<(), StockError> {
        if requested > self.quantity {
            return Err(StockError::Insufficient {
                name: self.name.clone(),
                available: self.quantity,
                requested,
            });
        }
        Ok(())
    }

    /// Decrement on-hand quantity. Leaves the product untouched on failure.
    pub fn take_stock(&mut self, amount: u32) -> Result<(), StockError> {
        self.ensure_available(amount)?;
        self.quantity -= amount;
        Ok(())
    }
}

/// Raw product input as submitted by inventory staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub price: Decimal,
    pub supplier: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Validated product fields, used for both creation and full edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub supplier: String,
    pub image: Option<String>,
}

impl ProductDraft {
    pub fn validate(self) -> DomainResult<NewProduct> {
        let name = require_text("name", &self.name)?;
        let category = require_text("category", &self.category)?;
        let supplier = require_text("supplier", &self.supplier)?;
        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q <= MAX_STOCK)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "quantity must be between 0 and {MAX_STOCK} (got {})",
                    self.quantity
                ))
            })?;
        let unit_price = Money::new(self.price)?;
        let image = self
            .image
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(NewProduct {
            name,
            category,
            quantity,
            unit_price,
            supplier,
            image,
        })
    }
}
