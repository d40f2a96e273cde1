use axum::{routing::get, Router};

pub mod admin;
pub mod auth;
pub mod customers;
pub mod inventory;
pub mod sales;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/customers", customers::router())
        .nest("/sales", sales::router())
        .nest("/admin", admin::router())
}
