//! Postgres-backed store.
//!
//! ## Error mapping
//!
//! | SQLx error | code | `StoreError` |
//! |---|---|---|
//! | unique violation | `23505` | `Conflict` (duplicate email) |
//! | foreign key violation | `23503` | `Conflict` (row still referenced by sales) |
//! | anything else | | `Backend` |
//!
//! ## Checkout locking
//!
//! A checkout takes `SELECT ... FOR UPDATE` row locks on its products in
//! ascending id order and decrements with a guarded
//! `UPDATE ... WHERE quantity >= $n`, so two overlapping checkouts on the
//! same product serialize and stock never goes negative.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use tillpoint_auth::{OtpChallenge, Role, User, MAX_OTP_ATTEMPTS};
use tillpoint_core::{CustomerId, Money, ProductId, SaleId, UserId};
use tillpoint_customers::Customer;
use tillpoint_inventory::Product;
use tillpoint_sales::{NewSale, SaleRecord, SalesSummary};

use super::r#trait::{
    CheckoutTx, CustomerStore, DecrementError, ProductStore, SalesLedger, StoreError, UserStore,
};

const PRODUCT_COLUMNS: &str =
    "id, name, category, quantity, price, supplier, image, created_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool and bring the schema up to date.
    #[instrument(skip(url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let products = rows.iter().map(product_from_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("row_count", products.len());
        Ok(products)
    }

    #[instrument(skip(self), err)]
    async fn low_stock(&self, threshold: u32) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE quantity <= $1 ORDER BY quantity ASC, name ASC"
        ))
        .bind(to_db_quantity(threshold)?)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?
            .ok_or_else(|| StoreError::product_not_found(id))?;
        product_from_row(&row)
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn create_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, quantity, price, supplier, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(to_db_quantity(product.quantity)?)
        .bind(product.unit_price.amount())
        .bind(&product.supplier)
        .bind(&product.image)
        .bind(product.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, category = $3, quantity = $4, price = $5, supplier = $6, image = $7
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(to_db_quantity(product.quantity)?)
        .bind(product.unit_price.amount())
        .bind(&product.supplier)
        .bind(&product.image)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::product_not_found(product.id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::product_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query("SELECT id, name, email, phone FROM customers ORDER BY name ASC, id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_customers", e))?;
        rows.iter().map(customer_from_row).collect()
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, StoreError> {
        let row = sqlx::query("SELECT id, name, email, phone FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_customer", e))?
            .ok_or_else(|| StoreError::customer_not_found(id))?;
        customer_from_row(&row)
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id), err)]
    async fn create_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO customers (id, name, email, phone) VALUES ($1, $2, $3, $4)")
            .bind(customer.id.as_uuid())
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(&customer.phone)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.id), err)]
    async fn update_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE customers SET name = $2, email = $3, phone = $4 WHERE id = $1")
            .bind(customer.id.as_uuid())
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(&customer.phone)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_customer", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::customer_not_found(customer.id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    async fn delete_customer(&self, id: CustomerId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_customer", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::customer_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl SalesLedger for PostgresStore {
    #[instrument(skip(self), err)]
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_checkout", e))?;
        Ok(Box::new(PostgresCheckoutTx { tx }))
    }

    #[instrument(skip(self), err)]
    async fn list_sales(&self) -> Result<Vec<SaleRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.id,
                s.product_id,
                p.name AS product_name,
                s.customer_id,
                c.name AS customer_name,
                s.quantity_sold,
                s.total_price,
                s.sold_at
            FROM sales s
            JOIN products p ON p.id = s.product_id
            JOIN customers c ON c.id = s.customer_id
            ORDER BY s.sold_at DESC, s.id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_sales", e))?;

        rows.iter()
            .map(|row| {
                Ok(SaleRecord {
                    id: SaleId::from_uuid(get(row, "id")?),
                    product_id: ProductId::from_uuid(get(row, "product_id")?),
                    product_name: get(row, "product_name")?,
                    customer_id: CustomerId::from_uuid(get(row, "customer_id")?),
                    customer_name: get(row, "customer_name")?,
                    quantity: from_db_quantity(get(row, "quantity_sold")?)?,
                    total: money(get(row, "total_price")?)?,
                    sold_at: get(row, "sold_at")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn summary_for_date(&self, date: NaiveDate) -> Result<SalesSummary, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(total_price), 0) AS total_sales,
                COALESCE(SUM(quantity_sold), 0)::BIGINT AS total_items
            FROM sales
            WHERE (sold_at AT TIME ZONE 'UTC')::date = $1
            "#,
        )
        .bind(date)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("summary_for_date", e))?;

        let total_items: i64 = get(&row, "total_items")?;
        Ok(SalesSummary {
            date,
            total_sales: money(get(&row, "total_sales")?)?,
            total_items: u64::try_from(total_items)
                .map_err(|_| StoreError::Backend(format!("negative item count {total_items}")))?,
        })
    }
}

struct PostgresCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PostgresCheckoutTx {
    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT id, name, email, phone FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_customer", e))?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn decrement_quantity(&mut self, id: ProductId, amount: u32) -> Result<(), DecrementError> {
        let amount = to_db_quantity(amount)?;
        let updated = sqlx::query(
            "UPDATE products SET quantity = quantity - $2 WHERE id = $1 AND quantity >= $2 RETURNING quantity",
        )
        .bind(id.as_uuid())
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_quantity", e))?;

        if updated.is_some() {
            return Ok(());
        }

        let current = sqlx::query("SELECT quantity FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("decrement_quantity", e))?;
        match current {
            None => Err(DecrementError::NotFound(id)),
            Some(row) => Err(DecrementError::WouldGoNegative {
                available: from_db_quantity(get(&row, "quantity")?)?,
            }),
        }
    }

    async fn append_sale(&mut self, sale: NewSale) -> Result<SaleId, StoreError> {
        let id = SaleId::new();
        sqlx::query(
            r#"
            INSERT INTO sales (id, product_id, customer_id, quantity_sold, total_price, sold_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(sale.product_id.as_uuid())
        .bind(sale.customer_id.as_uuid())
        .bind(to_db_quantity(sale.quantity)?)
        .bind(sale.total.amount())
        .bind(sale.sold_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_sale", e))?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

const USER_COLUMNS: &str =
    "id, name, email, role, password_hash, otp_code_hash, otp_expires_at, otp_attempts";

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, name, email, role, password_hash, otp_code_hash, otp_expires_at, otp_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.otp.as_ref().map(|o| o.code_hash.clone()))
        .bind(user.otp.as_ref().map(|o| o.expires_at))
        .bind(to_db_attempts(user.otp.as_ref().map_or(0, |o| o.attempts))?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?
            .ok_or_else(|| StoreError::user_not_found(id))?;
        user_from_row(&row)
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name ASC, id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, email = $3, role = $4, password_hash = $5 WHERE id = $1",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::user_not_found(user.id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::user_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self, otp), fields(user_id = %id), err)]
    async fn set_otp(&self, id: UserId, otp: Option<OtpChallenge>) -> Result<(), StoreError> {
        let (code_hash, expires_at, attempts) = match otp {
            Some(o) => (Some(o.code_hash), Some(o.expires_at), o.attempts),
            None => (None, None, 0),
        };
        let result = sqlx::query(
            r#"
            UPDATE users
            SET otp_code_hash = $2, otp_expires_at = $3, otp_attempts = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(code_hash)
        .bind(expires_at)
        .bind(to_db_attempts(attempts)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_otp", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::user_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn claim_otp_attempt(&self, id: UserId) -> Result<Option<OtpChallenge>, StoreError> {
        // A single guarded UPDATE, so parallel guesses cannot share an attempt.
        let row = sqlx::query(
            r#"
            UPDATE users
            SET otp_attempts = otp_attempts + 1
            WHERE id = $1 AND otp_code_hash IS NOT NULL AND otp_attempts < $2
            RETURNING otp_code_hash, otp_expires_at, otp_attempts
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_db_attempts(MAX_OTP_ATTEMPTS)?)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_otp_attempt", e))?;

        match row {
            Some(row) => otp_from_row(&row),
            None => {
                // Distinguish "no attempt left" from "no such user".
                self.get_user(id).await?;
                Ok(None)
            }
        }
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn money(amount: Decimal) -> Result<Money, StoreError> {
    Money::new(amount).map_err(|e| StoreError::Backend(format!("bad money value: {e}")))
}

fn to_db_quantity(quantity: u32) -> Result<i32, StoreError> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::Backend(format!("quantity {quantity} exceeds column range")))
}

fn from_db_quantity(quantity: i32) -> Result<u32, StoreError> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::Backend(format!("negative quantity {quantity} in database")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        category: get(row, "category")?,
        quantity: from_db_quantity(get(row, "quantity")?)?,
        unit_price: money(get(row, "price")?)?,
        supplier: get(row, "supplier")?,
        image: get(row, "image")?,
        created_at: get(row, "created_at")?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    Ok(Customer {
        id: CustomerId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        email: get(row, "email")?,
        phone: get(row, "phone")?,
    })
}

fn to_db_attempts(attempts: u32) -> Result<i32, StoreError> {
    i32::try_from(attempts)
        .map_err(|_| StoreError::Backend(format!("otp attempts {attempts} exceed column range")))
}

fn otp_from_row(row: &PgRow) -> Result<Option<OtpChallenge>, StoreError> {
    let code_hash: Option<String> = get(row, "otp_code_hash")?;
    let expires_at: Option<DateTime<Utc>> = get(row, "otp_expires_at")?;
    let attempts: i32 = get(row, "otp_attempts")?;
    let attempts = u32::try_from(attempts)
        .map_err(|_| StoreError::Backend(format!("negative otp attempts {attempts} in database")))?;
    Ok(code_hash
        .zip(expires_at)
        .map(|(code_hash, expires_at)| OtpChallenge {
            code_hash,
            expires_at,
            attempts,
        }))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = get(row, "role")?;
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        email: get(row, "email")?,
        role: role
            .parse::<Role>()
            .map_err(|e| StoreError::Backend(format!("bad role in database: {e}")))?,
        password_hash: get(row, "password_hash")?,
        otp: otp_from_row(row)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
