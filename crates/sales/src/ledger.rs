//! Sales ledger model: append-only sale lines and their read views.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{CustomerId, DomainResult, Entity, Money, ProductId, SaleId};

/// Immutable ledger entry: one product sold to one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineItem {
    pub id: SaleId,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub quantity: u32,
    /// Quantity × unit price at the moment of sale.
    pub total: Money,
    pub sold_at: DateTime<Utc>,
}

impl Entity for SaleLineItem {
    type Id = SaleId;

    fn id(&self) -> SaleId {
        self.id
    }
}

/// Fields of a sale line before the ledger assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub quantity: u32,
    pub total: Money,
    pub sold_at: DateTime<Utc>,
}

impl NewSale {
    pub fn into_line_item(self, id: SaleId) -> SaleLineItem {
        SaleLineItem {
            id,
            product_id: self.product_id,
            customer_id: self.customer_id,
            quantity: self.quantity,
            total: self.total,
            sold_at: self.sold_at,
        }
    }
}

/// Ledger row joined with display names, for history screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub product_id: ProductId,
    pub product_name: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub quantity: u32,
    pub total: Money,
    pub sold_at: DateTime<Utc>,
}

/// Totals for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub date: NaiveDate,
    pub total_sales: Money,
    pub total_items: u64,
}

impl SalesSummary {
    /// Aggregate the lines whose sale date matches `date`.
    ///
    /// Fails only if the day's takings exceed the largest storable amount.
    pub fn for_date<'a>(
        date: NaiveDate,
        sales: impl IntoIterator<Item = &'a SaleLineItem>,
    ) -> DomainResult<Self> {
        let mut total_sales = Money::ZERO;
        let mut total_items = 0u64;
        for sale in sales {
            if sale.sold_at.date_naive() == date {
                total_sales = total_sales.checked_add(sale.total)?;
                total_items += u64::from(sale.quantity);
            }
        }
        Ok(Self {
            date,
            total_sales,
            total_items,
        })
    }
}
