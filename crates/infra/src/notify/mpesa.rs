//! Safaricom Daraja STK push ("Lipa na M-Pesa Online").

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::RoundingStrategy;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use tillpoint_core::Money;

use super::{NotificationError, PaymentGateway};
use crate::config::MpesaConfig;

/// Daraja timestamps are East Africa Time.
const EAT_OFFSET_SECONDS: i32 = 3 * 3600;

/// Upper bound on each Daraja call, connect included.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushRequest<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    call_back_url: &'a str,
    account_reference: &'static str,
    transaction_desc: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushResponse {
    #[serde(default)]
    response_code: Option<String>,
    #[serde(default)]
    response_description: Option<String>,
    #[serde(default, rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
}

pub struct MpesaGateway {
    http: reqwest::Client,
    config: MpesaConfig,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig) -> Result<Self, NotificationError> {
        Self::with_timeout(config, HTTP_TIMEOUT)
    }

    pub fn with_timeout(
        config: MpesaConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, NotificationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Delivery(format!("http client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn access_token(&self) -> Result<String, NotificationError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let response = self
            .http
            .get(url)
            .basic_auth(
                self.config.consumer_key.expose_secret(),
                Some(self.config.consumer_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(format!("token request: {e}")))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected(format!(
                "token request returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Delivery(format!("token response: {e}")))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for MpesaGateway {
    #[tracing::instrument(skip(self), err)]
    async fn request_payment(&self, phone: &str, amount: Money) -> Result<(), NotificationError> {
        let amount = whole_shillings(amount)?;
        if amount == 0 {
            tracing::info!("nothing to collect; skipping STK push");
            return Ok(());
        }

        let msisdn = format_msisdn(phone);
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(
            &self.config.shortcode,
            self.config.passkey.expose_secret(),
            &timestamp,
        );
        let body = StkPushRequest {
            business_short_code: &self.config.shortcode,
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: &msisdn,
            party_b: &self.config.shortcode,
            phone_number: &msisdn,
            call_back_url: &self.config.callback_url,
            account_reference: "POS Checkout",
            transaction_desc: "Purchase at POS",
        };

        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(format!("stk push: {e}")))?;

        let status = response.status();
        let reply: StkPushResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Delivery(format!("stk push response ({status}): {e}")))?;

        if !status.is_success() || reply.response_code.as_deref() != Some("0") {
            return Err(NotificationError::Rejected(format!(
                "{status}: {}",
                reply.response_description.unwrap_or_default()
            )));
        }

        tracing::info!(
            checkout_request_id = reply.checkout_request_id.as_deref().unwrap_or(""),
            "stk push accepted"
        );
        Ok(())
    }
}

/// Normalize a Kenyan phone number to `2547XXXXXXXX`.
pub fn format_msisdn(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else if digits.starts_with("254") {
        digits
    } else if digits.starts_with('7') {
        format!("254{digits}")
    } else {
        digits
    }
}

/// Daraja only accepts whole currency units; half a shilling rounds up.
fn whole_shillings(amount: Money) -> Result<u64, NotificationError> {
    amount
        .amount()
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(|| NotificationError::Rejected(format!("amount {amount} out of range")))
}

fn daraja_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECONDS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}
