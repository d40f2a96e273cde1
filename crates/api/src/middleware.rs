use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use tillpoint_auth::{AuthError, JwtValidator, Principal};
use tillpoint_infra::AccountService;

use crate::app::errors::{auth_error_to_response, json_error};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub accounts: AccountService,
}

/// Resolve the bearer token into a [`Principal`] request extension.
///
/// The principal gets the role currently on file, not the one in the token;
/// tokens of deleted accounts are refused.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing bearer token",
        )
    })?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected token");
        json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid or expired token")
    })?;

    let role = state
        .accounts
        .current_role(claims.sub)
        .await
        .map_err(|e| match e {
            AuthError::UnknownUser => {
                tracing::debug!(user_id = %claims.sub, "token for a removed account");
                json_error(StatusCode::UNAUTHORIZED, "unauthorized", "account no longer exists")
            }
            other => auth_error_to_response(other),
        })?;
    if role != claims.role {
        tracing::debug!(
            user_id = %claims.sub,
            token_role = %claims.role,
            %role,
            "role changed since login"
        );
    }

    req.extensions_mut().insert(Principal::new(claims.sub, role));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
