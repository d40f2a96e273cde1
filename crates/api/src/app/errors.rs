use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tillpoint_auth::{AuthError, OtpError};
use tillpoint_core::DomainError;
use tillpoint_infra::StoreError;
use tillpoint_sales::CheckoutError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn checkout_error_to_response(err: CheckoutError) -> Response {
    let message = err.to_string();
    match err {
        CheckoutError::InvalidLineItem(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_line_item", message)
        }
        CheckoutError::CustomerNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "customer_not_found", message)
        }
        CheckoutError::ProductNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "product_not_found", message)
        }
        CheckoutError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        CheckoutError::Persistence(msg) => {
            tracing::error!(error = %msg, "checkout persistence failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_error",
                "checkout failed; nothing was recorded",
            )
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal storage error")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn auth_error_to_response(err: AuthError) -> Response {
    let message = err.to_string();
    match err {
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
        }
        AuthError::InvalidOtp(e @ OtpError::TooManyAttempts) => {
            json_error(StatusCode::TOO_MANY_REQUESTS, "too_many_attempts", e.to_string())
        }
        AuthError::InvalidOtp(_) => json_error(StatusCode::UNAUTHORIZED, "invalid_otp", message),
        AuthError::UnknownUser => json_error(StatusCode::NOT_FOUND, "not_found", message),
        AuthError::EmailTaken => json_error(StatusCode::CONFLICT, "email_taken", message),
        AuthError::Validation(e) => domain_error_to_response(e),
        AuthError::Delivery(_) => json_error(StatusCode::BAD_GATEWAY, "delivery_failed", message),
        AuthError::Hashing(_) | AuthError::Token(_) | AuthError::Store(_) => {
            tracing::error!(error = %message, "auth failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}

/// Body could not be decoded into the expected shape.
pub fn json_rejection_to_response(rejection: JsonRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

/// Parse a path/body id, answering 400 `invalid_id` on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}
