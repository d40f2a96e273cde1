//! Permission guard applied at the top of each protected handler.

use axum::http::StatusCode;
use axum::response::Response;

use tillpoint_auth::{authorize, Permission, Principal};

use crate::app::errors::json_error;

/// 403 with the missing permission named in the message.
pub fn require(principal: &Principal, permission: &Permission) -> Result<(), Response> {
    authorize(principal, permission).map_err(|e| {
        tracing::info!(
            user_id = %principal.user_id,
            role = %principal.role,
            permission = permission.as_str(),
            "permission denied"
        );
        json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}
