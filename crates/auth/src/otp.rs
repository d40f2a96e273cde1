//! Six-digit one-time codes for the second login step.
//!
//! Only an Argon2 hash of the code is kept; the plain code exists just long
//! enough to be mailed.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::password::{hash_password, verify_password, PasswordError};

/// Wrong guesses allowed before a code is discarded.
pub const MAX_OTP_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("no code has been issued")]
    NotIssued,

    #[error("code does not match")]
    Mismatch,

    #[error("code has expired")]
    Expired,

    #[error("too many wrong codes; request a new one")]
    TooManyAttempts,
}

/// A pending code: its hash, expiry and the guesses made against it so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

/// A freshly generated challenge plus the plain code to deliver.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub challenge: OtpChallenge,
}

impl OtpChallenge {
    pub fn generate(now: DateTime<Utc>, ttl: Duration) -> Result<IssuedOtp, PasswordError> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let challenge = Self {
            code_hash: hash_password(&code)?,
            expires_at: now + ttl,
            attempts: 0,
        };
        Ok(IssuedOtp { code, challenge })
    }

    /// Whether another guess may be made against this code.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < MAX_OTP_ATTEMPTS
    }

    pub fn verify(&self, submitted: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        if !verify_password(submitted.trim(), &self.code_hash) {
            return Err(OtpError::Mismatch);
        }
        if now >= self.expires_at {
            return Err(OtpError::Expired);
        }
        Ok(())
    }
}
