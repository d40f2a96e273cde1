//! Public login endpoints: register, password check, code check, resend.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use tillpoint_auth::UserDraft;
use tillpoint_core::UserId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<UserDraft>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let user = services
        .accounts
        .register(body)
        .await
        .map_err(errors::auth_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(dto::UserMessage {
            message: "user registered",
            user,
        }),
    )
        .into_response())
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let user = services
        .accounts
        .login(&body.email, &body.password)
        .await
        .map_err(errors::auth_error_to_response)?;

    Ok(Json(dto::UserMessage {
        message: "login code sent to your email",
        user,
    })
    .into_response())
}

pub async fn verify_otp(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::VerifyOtpRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let user_id: UserId = errors::parse_id(&body.user_id)?;
    let session = services
        .accounts
        .verify_otp(user_id, body.otp.trim())
        .await
        .map_err(errors::auth_error_to_response)?;

    Ok(Json(dto::SessionResponse {
        message: "login successful",
        role: session.role,
        token: session.token,
    })
    .into_response())
}

pub async fn resend_otp(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::ResendOtpRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;
    let user_id: UserId = errors::parse_id(&body.user_id)?;
    let user = services
        .accounts
        .resend_otp(user_id)
        .await
        .map_err(errors::auth_error_to_response)?;

    Ok(Json(dto::UserMessage {
        message: "a new code has been sent",
        user,
    })
    .into_response())
}
