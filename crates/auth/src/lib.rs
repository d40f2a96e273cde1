//! `tillpoint-auth`: who may do what at the till.
//!
//! Password hashing, one-time codes, JWT encoding and the role policy live
//! here. Nothing in this crate touches HTTP or storage.

pub mod authorize;
pub mod claims;
pub mod error;
pub mod jwt;
pub mod otp;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{authorize, AuthzError};
pub use error::AuthError;
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use otp::{IssuedOtp, OtpChallenge, OtpError, MAX_OTP_ATTEMPTS};
pub use password::{hash_password, verify_password, PasswordError};
pub use permissions::{permissions_for, Permission};
pub use principal::Principal;
pub use roles::Role;
pub use user::{NewUser, User, UserDraft, UserView};
