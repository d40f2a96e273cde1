//! Outbound notifications: e-mail (login codes, receipts) and mobile payment
//! requests.
//!
//! Everything here is best-effort from the checkout's point of view; only the
//! login flow treats a mail failure as fatal.

pub mod email;
pub mod mpesa;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tillpoint_core::Money;
use tillpoint_customers::Customer;
use tillpoint_sales::CheckoutReceipt;

pub use email::SmtpMailer;
pub use mpesa::MpesaGateway;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to render message: {0}")]
    Render(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("payment provider rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError>;

    async fn send_receipt(
        &self,
        customer: &Customer,
        receipt: &CheckoutReceipt,
    ) -> Result<(), NotificationError>;
}

/// Push a payment prompt to the customer's phone for `amount`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn request_payment(&self, phone: &str, amount: Money) -> Result<(), NotificationError>;
}

/// Used when SMTP is not configured: messages go to the log instead.
#[derive(Debug, Default, Clone)]
pub struct LogOnlyMailer;

#[async_trait]
impl Mailer for LogOnlyMailer {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        tracing::info!(%to, %code, %expires_at, "smtp not configured; login code not mailed");
        Ok(())
    }

    async fn send_receipt(
        &self,
        customer: &Customer,
        receipt: &CheckoutReceipt,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            customer_id = %customer.id,
            to = %customer.email,
            total = %receipt.total,
            items = receipt.items.len(),
            "smtp not configured; receipt not mailed"
        );
        Ok(())
    }
}

/// Used when M-Pesa is not configured.
#[derive(Debug, Default, Clone)]
pub struct DisabledPaymentGateway;

#[async_trait]
impl PaymentGateway for DisabledPaymentGateway {
    async fn request_payment(&self, phone: &str, amount: Money) -> Result<(), NotificationError> {
        tracing::info!(%phone, %amount, "payment gateway not configured; request skipped");
        Ok(())
    }
}
