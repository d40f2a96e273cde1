//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error: deterministic input failures, no IO concerns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Reject blank required text fields, returning the trimmed value.
pub fn require_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Required, lowercased `local@domain.tld` address.
pub fn require_email(value: &str) -> DomainResult<String> {
    let email = require_text("email", value)?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(DomainError::validation(format!("invalid email address: {email}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_trims() {
        assert_eq!(require_text("name", "  Sugar 1kg ").unwrap(), "Sugar 1kg");
    }

    #[test]
    fn require_text_rejects_whitespace() {
        let err = require_text("supplier", "   ").unwrap_err();
        assert_eq!(err, DomainError::validation("supplier cannot be empty"));
    }

    #[test]
    fn require_email_lowercases_and_checks_shape() {
        assert_eq!(require_email(" Ann@Shop.KE ").unwrap(), "ann@shop.ke");
        assert!(require_email("ann.shop.ke").is_err());
        assert!(require_email("@shop.ke").is_err());
    }
}
