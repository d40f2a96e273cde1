use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier, e.g. `"inventory.read"`.
///
/// `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::from_static("*");
pub const INVENTORY_READ: Permission = Permission::from_static("inventory.read");
pub const INVENTORY_WRITE: Permission = Permission::from_static("inventory.write");
pub const CUSTOMERS_READ: Permission = Permission::from_static("customers.read");
pub const CUSTOMERS_WRITE: Permission = Permission::from_static("customers.write");
pub const SALES_CHECKOUT: Permission = Permission::from_static("sales.checkout");
pub const SALES_READ: Permission = Permission::from_static("sales.read");
pub const ADMIN_USERS: Permission = Permission::from_static("admin.users");
pub const ADMIN_SALES: Permission = Permission::from_static("admin.sales");

/// Static role policy.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    match role {
        Role::Admin => vec![ALL],
        Role::Cashier => vec![
            INVENTORY_READ,
            CUSTOMERS_READ,
            CUSTOMERS_WRITE,
            SALES_CHECKOUT,
            SALES_READ,
        ],
        Role::Inventory => vec![INVENTORY_READ, INVENTORY_WRITE, SALES_READ],
    }
}
