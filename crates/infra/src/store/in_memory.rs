use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use tillpoint_auth::{OtpChallenge, User};
use tillpoint_core::{CustomerId, ProductId, SaleId, UserId};
use tillpoint_customers::Customer;
use tillpoint_inventory::Product;
use tillpoint_sales::{NewSale, SaleLineItem, SaleRecord, SalesSummary};

use super::r#trait::{
    CheckoutTx, CustomerStore, DecrementError, ProductStore, SalesLedger, StoreError, UserStore,
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    sales: Vec<SaleLineItem>,
    users: HashMap<UserId, User>,
}

impl State {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

/// Whole-store mutex; a checkout holds it from `begin_checkout` to commit or
/// rollback, so checkouts are fully serialized.
///
/// Intended for tests/dev.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(products: &mut [Product]) {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        newest_first(&mut products);
        Ok(products)
    }

    async fn low_stock(&self, threshold: u32) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_low_stock(threshold))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.name.cmp(&b.name)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let state = self.state.lock().await;
        state
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::product_not_found(id))
    }

    async fn create_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let slot = state
            .products
            .get_mut(&product.id)
            .ok_or_else(|| StoreError::product_not_found(product.id))?;
        *slot = product.clone();
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&id) {
            return Err(StoreError::product_not_found(id));
        }
        if state.sales.iter().any(|s| s.product_id == id) {
            return Err(StoreError::Conflict(format!("product {id} has recorded sales")));
        }
        state.products.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let state = self.state.lock().await;
        let mut customers: Vec<Customer> = state.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(customers)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, StoreError> {
        let state = self.state.lock().await;
        state
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::customer_not_found(id))
    }

    async fn create_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.customers.contains_key(&customer.id) {
            return Err(StoreError::Conflict(format!("customer {} already exists", customer.id)));
        }
        state.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let slot = state
            .customers
            .get_mut(&customer.id)
            .ok_or_else(|| StoreError::customer_not_found(customer.id))?;
        *slot = customer.clone();
        Ok(())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&id) {
            return Err(StoreError::customer_not_found(id));
        }
        if state.sales.iter().any(|s| s.customer_id == id) {
            return Err(StoreError::Conflict(format!("customer {id} has recorded sales")));
        }
        state.customers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SalesLedger for InMemoryStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryCheckoutTx {
            guard,
            staged_products: HashMap::new(),
            staged_sales: Vec::new(),
        }))
    }

    async fn list_sales(&self) -> Result<Vec<SaleRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut records: Vec<SaleRecord> = state
            .sales
            .iter()
            .map(|s| SaleRecord {
                id: s.id,
                product_id: s.product_id,
                product_name: state
                    .products
                    .get(&s.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                customer_id: s.customer_id,
                customer_name: state
                    .customers
                    .get(&s.customer_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                quantity: s.quantity,
                total: s.total,
                sold_at: s.sold_at,
            })
            .collect();
        records.sort_by(|a, b| b.sold_at.cmp(&a.sold_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn summary_for_date(&self, date: NaiveDate) -> Result<SalesSummary, StoreError> {
        let state = self.state.lock().await;
        SalesSummary::for_date(date, &state.sales).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

/// Holds the store lock; changes are staged and only written back on commit.
struct InMemoryCheckoutTx {
    guard: OwnedMutexGuard<State>,
    staged_products: HashMap<ProductId, Product>,
    staged_sales: Vec<SaleLineItem>,
}

#[async_trait]
impl CheckoutTx for InMemoryCheckoutTx {
    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.guard.customers.get(&id).cloned())
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.staged_products
                    .get(id)
                    .or_else(|| self.guard.products.get(id))
                    .cloned()
            })
            .collect())
    }

    async fn decrement_quantity(&mut self, id: ProductId, amount: u32) -> Result<(), DecrementError> {
        if !self.staged_products.contains_key(&id) {
            let product = self
                .guard
                .products
                .get(&id)
                .cloned()
                .ok_or(DecrementError::NotFound(id))?;
            self.staged_products.insert(id, product);
        }
        let product = self
            .staged_products
            .get_mut(&id)
            .ok_or(DecrementError::NotFound(id))?;
        product
            .take_stock(amount)
            .map_err(|_| DecrementError::WouldGoNegative {
                available: product.quantity,
            })
    }

    async fn append_sale(&mut self, sale: NewSale) -> Result<SaleId, StoreError> {
        let id = SaleId::new();
        self.staged_sales.push(sale.into_line_item(id));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryCheckoutTx {
            mut guard,
            staged_products,
            staged_sales,
        } = *self;
        guard.products.extend(staged_products);
        guard.sales.extend(staged_sales);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.email_taken(&user.email, None) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::user_not_found(id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        let slot = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::user_not_found(user.id))?;
        slot.name = user.name.clone();
        slot.email = user.email.clone();
        slot.role = user.role;
        slot.password_hash = user.password_hash.clone();
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::user_not_found(id))
    }

    async fn set_otp(&self, id: UserId, otp: Option<OtpChallenge>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::user_not_found(id))?;
        user.otp = otp;
        Ok(())
    }

    async fn claim_otp_attempt(&self, id: UserId) -> Result<Option<OtpChallenge>, StoreError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::user_not_found(id))?;
        Ok(user
            .otp
            .as_mut()
            .filter(|otp| otp.has_attempts_left())
            .map(|otp| {
                otp.attempts += 1;
                otp.clone()
            }))
    }
}
