//! Request/response bodies that are not domain types themselves.

use serde::{Deserialize, Serialize};

use tillpoint_auth::{Role, UserView};
use tillpoint_inventory::Product;
use tillpoint_sales::CheckoutReceipt;

#[derive(Debug, Deserialize)]
pub struct CheckoutItemRequest {
    pub product_id: String,
    pub quantity_sold: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequestBody {
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<CheckoutItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    pub receipt: CheckoutReceipt,
}

#[derive(Debug, Serialize)]
pub struct InventoryOverview {
    pub products: Vec<Product>,
    pub low_stock: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub user_id: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct UserMessage {
    pub message: &'static str,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub role: Role,
    pub token: String,
}
