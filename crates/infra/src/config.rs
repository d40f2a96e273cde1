//! Runtime configuration read from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `TILLPOINT_BIND` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | `dev-secret` (warned); required with `DATABASE_URL` |
//! | `DATABASE_URL` | unset: in-memory store |
//! | `OTP_TTL_SECONDS` | 60 |
//! | `TOKEN_TTL_MINUTES` | 480 |
//! | `LOW_STOCK_THRESHOLD` | 5 |
//! | `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` | unset: log-only mailer |
//! | `MPESA_CONSUMER_KEY`, `MPESA_CONSUMER_SECRET`, `MPESA_SHORTCODE`, `MPESA_PASSKEY`, `MPESA_CALLBACK_URL`, `MPESA_BASE_URL` | unset: payment requests skipped |
//!
//! The SMTP and M-Pesa groups are all-or-nothing: a partly configured group
//! is an error, not a silent fallback.

use std::net::SocketAddr;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MPESA_BASE_URL: &str = "https://sandbox.safaricom.co.ke";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub jwt_secret: SecretString,
    pub database_url: Option<SecretString>,
    pub otp_ttl: Duration,
    pub token_ttl: Duration,
    pub low_stock_threshold: u32,
    pub smtp: Option<SmtpConfig>,
    pub mpesa: Option<MpesaConfig>,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Safaricom Daraja (M-Pesa STK push) credentials.
#[derive(Clone)]
pub struct MpesaConfig {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub shortcode: String,
    pub passkey: SecretString,
    pub callback_url: String,
    pub base_url: String,
}

impl std::fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("consumer_key", &"[REDACTED]")
            .field("consumer_secret", &"[REDACTED]")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AppConfig {
    /// Read the process environment. The binary loads `.env` beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = parse_or(&get, "TILLPOINT_BIND", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let database_url = get("DATABASE_URL").map(SecretString::from);

        // The development secret is only acceptable for the throwaway in-memory store.
        let jwt_secret = match (get("JWT_SECRET"), &database_url) {
            (Some(secret), _) => SecretString::from(secret),
            (None, Some(_)) => {
                return Err(ConfigError::InvalidEnvVar(
                    "JWT_SECRET".to_string(),
                    "must be set when DATABASE_URL is set".to_string(),
                ));
            }
            (None, None) => {
                tracing::warn!("JWT_SECRET is not set; using the development secret");
                SecretString::from(DEV_JWT_SECRET)
            }
        };

        let otp_seconds: i64 = parse_or(&get, "OTP_TTL_SECONDS", 60)?;
        let token_minutes: i64 = parse_or(&get, "TOKEN_TTL_MINUTES", 480)?;
        if otp_seconds <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OTP_TTL_SECONDS".to_string(),
                "must be positive".to_string(),
            ));
        }
        if token_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "TOKEN_TTL_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind,
            jwt_secret,
            database_url,
            otp_ttl: Duration::seconds(otp_seconds),
            token_ttl: Duration::minutes(token_minutes),
            low_stock_threshold: parse_or(
                &get,
                "LOW_STOCK_THRESHOLD",
                tillpoint_inventory::DEFAULT_LOW_STOCK_THRESHOLD,
            )?,
            smtp: SmtpConfig::from_lookup(&get)?,
            mpesa: MpesaConfig::from_lookup(&get)?,
        })
    }
}

impl SmtpConfig {
    fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let group = ["SMTP_HOST", "SMTP_USERNAME", "SMTP_PASSWORD", "SMTP_FROM"];
        let Some([host, username, password, from_address]) = all_or_nothing(get, group, "SMTP_*")?
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            host,
            port: parse_or(get, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            username,
            password: SecretString::from(password),
            from_address,
        }))
    }
}

impl MpesaConfig {
    fn from_lookup(get: &impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let group = [
            "MPESA_CONSUMER_KEY",
            "MPESA_CONSUMER_SECRET",
            "MPESA_SHORTCODE",
            "MPESA_PASSKEY",
            "MPESA_CALLBACK_URL",
        ];
        let Some([key, secret, shortcode, passkey, callback_url]) =
            all_or_nothing(get, group, "MPESA_*")?
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            consumer_key: SecretString::from(key),
            consumer_secret: SecretString::from(secret),
            shortcode,
            passkey: SecretString::from(passkey),
            callback_url,
            base_url: get("MPESA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MPESA_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }))
    }
}

/// `Some(values)` when every key is set, `None` when none is, error otherwise.
fn all_or_nothing<const N: usize>(
    get: &impl Fn(&str) -> Option<String>,
    keys: [&str; N],
    group: &str,
) -> Result<Option<[String; N]>, ConfigError> {
    let values = keys.map(get);
    let set = values.iter().filter(|v| v.is_some()).count();
    if set == 0 {
        return Ok(None);
    }
    if set < N {
        let missing: Vec<&str> = keys
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        return Err(ConfigError::InvalidEnvVar(
            group.to_string(),
            format!("partially configured, missing {}", missing.join(", ")),
        ));
    }
    Ok(Some(values.map(Option::unwrap_or_default)))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
