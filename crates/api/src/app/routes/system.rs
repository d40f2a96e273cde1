use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use tillpoint_auth::Principal;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id.to_string(),
        "role": principal.role.as_str(),
        "permissions": principal.permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
