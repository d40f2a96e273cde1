use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use tillpoint_api::app::services::AppServices;
use tillpoint_auth::{JwtClaims, Role, UserDraft};
use tillpoint_core::UserId;
use tillpoint_customers::Customer;
use tillpoint_infra::{
    AppConfig, DisabledPaymentGateway, InMemoryStore, Mailer, NotificationError,
};
use tillpoint_sales::CheckoutReceipt;

const JWT_SECRET: &str = "test-secret";

/// Keeps login codes so the tests can complete the OTP step.
#[derive(Default)]
struct CapturingMailer {
    codes: Mutex<Vec<(String, String)>>,
}

impl CapturingMailer {
    fn code_for(&self, email: &str) -> Option<String> {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        self.codes
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }

    async fn send_receipt(
        &self,
        _customer: &Customer,
        _receipt: &CheckoutReceipt,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    mailer: Arc<CapturingMailer>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let mailer = Arc::new(CapturingMailer::default());
        let services = Arc::new(AppServices::new(
            Arc::new(InMemoryStore::new()),
            &config,
            mailer.clone(),
            Arc::new(DisabledPaymentGateway),
        ));

        // Same router as prod, bound to an ephemeral port.
        let app = tillpoint_api::app::build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            mailer,
            client: reqwest::Client::new(),
            handle,
        }
    }

    /// Register a staff account with `role` and mint a token for it.
    async fn token(&self, role: Role) -> String {
        let user = self
            .services
            .accounts
            .register(UserDraft {
                name: format!("{role} on shift"),
                email: format!("{}@staff.till.shop", UserId::new()),
                password: Some("shift-pass".to_string()),
                role: role.to_string(),
            })
            .await
            .expect("register staff account");
        mint_jwt_at(user.id, role, Utc::now(), ChronoDuration::minutes(10))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn add_product(&self, token: &str, name: &str, quantity: i64, price: &str) -> String {
        let res = self
            .post(
                token,
                "/inventory",
                json!({
                    "name": name,
                    "category": "Dairy",
                    "quantity": quantity,
                    "price": price,
                    "supplier": "Brookside",
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn add_customer(&self, token: &str) -> String {
        let res = self
            .post(
                token,
                "/customers",
                json!({
                    "name": "Amina Otieno",
                    "email": "amina@example.com",
                    "phone": "0712345678",
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn quantity_of(&self, token: &str, product_id: &str) -> i64 {
        let res = self.get(token, &format!("/inventory/{product_id}")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["quantity"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt_at(sub: UserId, role: Role, issued_at: DateTime<Utc>, ttl: ChronoDuration) -> String {
    let claims = JwtClaims {
        sub,
        role,
        issued_at,
        expires_at: issued_at + ttl,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = srv.get("not-a-jwt", "/inventory").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_and_foreign_tokens_are_rejected() {
    let srv = TestServer::spawn().await;

    let expired = mint_jwt_at(
        UserId::new(),
        Role::Admin,
        Utc::now() - ChronoDuration::hours(9),
        ChronoDuration::hours(8),
    );
    assert_eq!(srv.get(&expired, "/whoami").await.status(), StatusCode::UNAUTHORIZED);

    let foreign = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &JwtClaims {
            sub: UserId::new(),
            role: Role::Admin,
            issued_at: Utc::now(),
            expires_at: Utc::now() + ChronoDuration::minutes(5),
        },
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();
    assert_eq!(srv.get(&foreign, "/whoami").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_the_token_role() {
    let srv = TestServer::spawn().await;

    let res = srv.get(&srv.token(Role::Cashier).await, "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["role"], "cashier");
    assert!(body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "sales.checkout"));
}

#[tokio::test]
async fn checkout_decrements_stock_and_records_the_sale() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;
    let cashier = srv.token(Role::Cashier).await;

    let product = srv.add_product(&admin, "Milk 500ml", 10, "100").await;
    let customer = srv.add_customer(&admin).await;

    let res = srv
        .post(
            &cashier,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [{ "product_id": product, "quantity_sold": 3 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "sale completed");
    assert_eq!(body["receipt"]["total"], "300");
    assert_eq!(body["receipt"]["items"][0]["name"], "Milk 500ml");
    assert_eq!(body["receipt"]["items"][0]["quantity"], 3);

    assert_eq!(srv.quantity_of(&admin, &product).await, 7);

    let history: Value = srv.get(&cashier, "/sales/history").await.json().await.unwrap();
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["product_name"], "Milk 500ml");
    assert_eq!(rows[0]["customer_name"], "Amina Otieno");

    let today: Value = srv.get(&cashier, "/sales/summary/today").await.json().await.unwrap();
    assert_eq!(today["total_sales"], "300");
    assert_eq!(today["total_items"], 3);
}

#[tokio::test]
async fn short_stock_rejects_the_whole_checkout() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;

    let plenty = srv.add_product(&admin, "Bread", 10, "65").await;
    let scarce = srv.add_product(&admin, "Eggs (tray)", 2, "450").await;
    let customer = srv.add_customer(&admin).await;

    let res = srv
        .post(
            &admin,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [
                    { "product_id": plenty, "quantity_sold": 1 },
                    { "product_id": scarce, "quantity_sold": 5 },
                ],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert!(body["message"].as_str().unwrap().contains("Eggs (tray)"));

    assert_eq!(srv.quantity_of(&admin, &plenty).await, 10);
    assert_eq!(srv.quantity_of(&admin, &scarce).await, 2);
    let history: Value = srv.get(&admin, "/sales/history").await.json().await.unwrap();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_errors_map_to_statuses() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;
    let product = srv.add_product(&admin, "Sugar 1kg", 4, "180").await;
    let customer = srv.add_customer(&admin).await;

    // Unknown customer.
    let res = srv
        .post(
            &admin,
            "/sales/checkout",
            json!({
                "customer_id": UserId::new().to_string(),
                "items": [{ "product_id": product, "quantity_sold": 1 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "customer_not_found");

    // Zero quantity.
    let res = srv
        .post(
            &admin,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [{ "product_id": product, "quantity_sold": 0 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_line_item");

    // Malformed product id.
    let res = srv
        .post(
            &admin,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [{ "product_id": "nope", "quantity_sold": 1 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    assert_eq!(srv.quantity_of(&admin, &product).await, 4);
}

#[tokio::test]
async fn checkout_total_beyond_money_range_is_a_bad_line() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;
    let bullion = srv
        .add_product(&admin, "Bullion", 1_000_000_000, "9999999999.99")
        .await;
    let customer = srv.add_customer(&admin).await;

    let res = srv
        .post(
            &admin,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [{ "product_id": bullion, "quantity_sold": 1_000_000_000 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_line_item");
    assert_eq!(srv.quantity_of(&admin, &bullion).await, 1_000_000_000);

    // The server is still serving after the rejected sale.
    assert_eq!(srv.client.get(srv.url("/health")).send().await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn roles_limit_what_staff_can_do() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;
    let cashier = srv.token(Role::Cashier).await;
    let stock_clerk = srv.token(Role::Inventory).await;

    let product = srv.add_product(&admin, "Tea leaves", 5, "250").await;
    let customer = srv.add_customer(&admin).await;

    let res = srv
        .post(
            &cashier,
            "/inventory",
            json!({"name": "X", "category": "Y", "quantity": 1, "price": "1", "supplier": "Z"}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .post(
            &stock_clerk,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [{ "product_id": product, "quantity_sold": 1 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    assert_eq!(srv.get(&cashier, "/admin/users").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get(&stock_clerk, "/admin/sales").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get(&stock_clerk, "/sales/history").await.status(), StatusCode::OK);
    assert_eq!(srv.get(&admin, "/admin/sales").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn inventory_crud_and_low_stock() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;

    let low = srv.add_product(&admin, "Salt", 3, "40").await;
    let _ok = srv.add_product(&admin, "Rice 2kg", 50, "320.50").await;

    let overview: Value = srv.get(&admin, "/inventory").await.json().await.unwrap();
    assert_eq!(overview["products"].as_array().unwrap().len(), 2);
    let low_stock = overview["low_stock"].as_array().unwrap();
    assert_eq!(low_stock.len(), 1);
    assert_eq!(low_stock[0]["id"], low.as_str());

    let res = srv
        .client
        .put(srv.url(&format!("/inventory/{low}")))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Salt",
            "category": "Pantry",
            "quantity": 30,
            "price": "45",
            "supplier": "Kensalt",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(srv.quantity_of(&admin, &low).await, 30);

    for price in ["-2", "19.999", "10000000000", "100000000000000000000"] {
        let res = srv
            .post(
                &admin,
                "/inventory",
                json!({"name": "Bad", "category": "Y", "quantity": 1, "price": price, "supplier": "Z"}),
            )
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "price {price}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "validation_error", "price {price}");
    }

    let res = srv
        .client
        .delete(srv.url(&format!("/inventory/{low}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        srv.get(&admin, &format!("/inventory/{low}")).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(srv.get(&admin, "/inventory/abc").await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sold_products_and_customers_cannot_be_deleted() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;
    let product = srv.add_product(&admin, "Soap", 8, "95").await;
    let customer = srv.add_customer(&admin).await;

    let res = srv
        .post(
            &admin,
            "/sales/checkout",
            json!({
                "customer_id": customer,
                "items": [{ "product_id": product, "quantity_sold": 2 }],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    for path in [format!("/inventory/{product}"), format!("/customers/{customer}")] {
        let res = srv
            .client
            .delete(srv.url(&path))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT, "{path}");
    }
}

#[tokio::test]
async fn summary_for_a_date_validates_the_format() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;

    let res = srv.get(&admin, "/sales/summary/2026-01-15").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["date"], "2026-01-15");
    assert_eq!(body["total_sales"], "0");
    assert_eq!(body["total_items"], 0);

    let res = srv.get(&admin, "/sales/summary/15-01-2026").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_login_and_verify_code() {
    let srv = TestServer::spawn().await;
    let email = "wanjiru@till.shop";
    let account = json!({
        "name": "Wanjiru",
        "email": email,
        "password": "hunter22",
        "role": "cashier",
    });

    let res = srv.client.post(srv.url("/auth/register")).json(&account).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = srv.client.post(srv.url("/auth/register")).json(&account).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": email, "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    assert!(body["user"].get("password_hash").is_none());

    let code = srv.mailer.code_for(email).expect("code was mailed");
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let res = srv
        .client
        .post(srv.url("/auth/verify-otp"))
        .json(&json!({ "user_id": user_id, "otp": wrong }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/auth/verify-otp"))
        .json(&json!({ "user_id": user_id, "otp": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["role"], "cashier");
    let token = body["token"].as_str().unwrap();

    let who: Value = srv.get(token, "/whoami").await.json().await.unwrap();
    assert_eq!(who["user_id"], user_id.as_str());
}

#[tokio::test]
async fn repeated_wrong_codes_force_a_new_one() {
    let srv = TestServer::spawn().await;
    let email = "achieng@till.shop";
    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({ "name": "Achieng", "email": email, "password": "pw-4567", "role": "cashier" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": email, "password": "pw-4567" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let code = srv.mailer.code_for(email).expect("code was mailed");
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let verify = |otp: String| {
        srv.client
            .post(srv.url("/auth/verify-otp"))
            .json(&json!({ "user_id": user_id, "otp": otp }))
            .send()
    };

    assert_eq!(verify(wrong.to_string()).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    assert_eq!(verify(wrong.to_string()).await.unwrap().status(), StatusCode::UNAUTHORIZED);
    let res = verify(wrong.to_string()).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "too_many_attempts");

    // The mailed code no longer works.
    assert_eq!(verify(code).await.unwrap().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_requires_every_field() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({ "name": "No Role", "email": "x@till.shop", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({ "name": "Bad Role", "email": "y@till.shop", "password": "pw", "role": "owner" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn admin_manages_users() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;

    let res = srv
        .post(
            &admin,
            "/admin/users",
            json!({ "name": "Otieno", "email": "otieno@till.shop", "password": "pw123", "role": "inventory" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .put(srv.url(&format!("/admin/users/{id}")))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Otieno O.", "email": "otieno@till.shop", "role": "cashier" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["role"], "cashier");

    let users: Value = srv.get(&admin, "/admin/users").await.json().await.unwrap();
    assert!(users.as_array().unwrap().iter().any(|u| u["id"] == id.as_str()));

    let res = srv
        .client
        .delete(srv.url(&format!("/admin/users/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let users: Value = srv.get(&admin, "/admin/users").await.json().await.unwrap();
    assert!(users.as_array().unwrap().iter().all(|u| u["id"] != id.as_str()));
}

#[tokio::test]
async fn removed_or_demoted_staff_lose_access_immediately() {
    let srv = TestServer::spawn().await;
    let admin = srv.token(Role::Admin).await;

    let res = srv
        .post(
            &admin,
            "/admin/users",
            json!({ "name": "Njeri", "email": "njeri@till.shop", "password": "pw123", "role": "admin" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    let njeri = mint_jwt_at(
        id.parse().unwrap(),
        Role::Admin,
        Utc::now(),
        ChronoDuration::hours(8),
    );
    assert_eq!(srv.get(&njeri, "/admin/users").await.status(), StatusCode::OK);

    let res = srv
        .client
        .put(srv.url(&format!("/admin/users/{id}")))
        .bearer_auth(&admin)
        .json(&json!({ "name": "Njeri", "email": "njeri@till.shop", "role": "cashier" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Same token, but the account is now a cashier.
    assert_eq!(srv.get(&njeri, "/admin/users").await.status(), StatusCode::FORBIDDEN);
    let who: Value = srv.get(&njeri, "/whoami").await.json().await.unwrap();
    assert_eq!(who["role"], "cashier");

    let res = srv
        .client
        .delete(srv.url(&format!("/admin/users/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = srv.get(&njeri, "/whoami").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Tokens for ids that were never registered are refused too.
    let stranger = mint_jwt_at(UserId::new(), Role::Admin, Utc::now(), ChronoDuration::minutes(5));
    assert_eq!(srv.get(&stranger, "/whoami").await.status(), StatusCode::UNAUTHORIZED);
}
