use serde::{Deserialize, Serialize};

use tillpoint_core::error::{require_email, require_text};
use tillpoint_core::{CustomerId, DomainError, DomainResult, Entity};

/// Entity: Customer.
///
/// Referenced by sales, never mutated by them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> CustomerId {
        self.id
    }
}

impl Customer {
    pub fn create(id: CustomerId, new: NewCustomer) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
        }
    }

    pub fn revise(&mut self, changes: NewCustomer) {
        self.name = changes.name;
        self.email = changes.email;
        self.phone = changes.phone;
    }
}

/// Raw customer input (all fields required).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Validated customer fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CustomerDraft {
    pub fn validate(self) -> DomainResult<NewCustomer> {
        let name = require_text("name", &self.name)?;
        let email = require_email(&self.email)?;
        let phone = require_text("phone", &self.phone)?;

        if !phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(format!("invalid phone number: {phone}")));
        }

        Ok(NewCustomer { name, email, phone })
    }
}
