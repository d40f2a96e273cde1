use thiserror::Error;

use tillpoint_core::DomainError;

use crate::{OtpError, PasswordError, TokenError};

/// Failures of the login / OTP / registration flows.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or wrong password. Deliberately one variant for both.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired code")]
    InvalidOtp(#[from] OtpError),

    #[error("user not found")]
    UnknownUser,

    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Hashing(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),

    /// The code could not be delivered.
    #[error("could not deliver code: {0}")]
    Delivery(String),

    #[error("user store failure: {0}")]
    Store(String),
}
