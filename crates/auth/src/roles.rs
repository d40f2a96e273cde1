use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tillpoint_core::DomainError;

/// Staff role. Decides which permissions a signed-in user carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cashier,
    Inventory,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Cashier, Role::Inventory];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
            Role::Inventory => "inventory",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "role must be one of admin, cashier, inventory (got '{s}')"
                ))
            })
    }
}
