//! Exact, non-negative monetary amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A non-negative decimal amount in the store's currency.
///
/// Backed by `rust_decimal::Decimal`, so sums and products are exact (no
/// binary floating point drift). Serialized as a decimal string.
///
/// Amounts carry at most two decimal places and never exceed
/// [`Money::max`], the range of the `NUMERIC(12, 2)` money columns. All
/// arithmetic is checked against that range instead of panicking.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

/// Largest storable amount in cents: 9,999,999,999.99.
const MAX_CENTS: i64 = 999_999_999_999;
const SCALE: u32 = 2;

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation(format!(
                "amount cannot be negative (got {amount})"
            )));
        }
        let amount = amount.normalize();
        if amount.scale() > SCALE {
            return Err(DomainError::validation(format!(
                "amount can have at most {SCALE} decimal places (got {amount})"
            )));
        }
        if amount > Self::max().0 {
            return Err(DomainError::validation(format!(
                "amount {amount} exceeds the maximum of {}",
                Self::max()
            )));
        }
        Ok(Self(amount))
    }

    pub fn max() -> Self {
        Self(Decimal::new(MAX_CENTS, SCALE))
    }

    /// Whole units, e.g. `Money::from_units(100)` for 100.00.
    pub fn from_units(units: u32) -> Self {
        Self(Decimal::from(units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Line total: this unit price multiplied by a quantity.
    pub fn times(self, quantity: u32) -> DomainResult<Self> {
        let product = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| out_of_range(format!("{self} x {quantity}")))?;
        Self::new(product).map_err(|_| out_of_range(format!("{self} x {quantity}")))
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Self> {
        let sum = self
            .0
            .checked_add(rhs.0)
            .ok_or_else(|| out_of_range(format!("{self} + {rhs}")))?;
        Self::new(sum).map_err(|_| out_of_range(format!("{self} + {rhs}")))
    }

    /// Checked sum of several amounts.
    pub fn total(amounts: impl IntoIterator<Item = Money>) -> DomainResult<Self> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

fn out_of_range(expr: String) -> DomainError {
    DomainError::validation(format!("amount out of range: {expr}"))
}

impl ValueObject for Money {}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
