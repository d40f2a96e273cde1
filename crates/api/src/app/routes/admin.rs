//! Staff management and the full sales view; admin only.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

use tillpoint_auth::permissions::{ADMIN_SALES, ADMIN_USERS};
use tillpoint_auth::{Principal, UserDraft};
use tillpoint_core::UserId;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route("/sales", get(all_sales))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, Response> {
    require(&principal, &ADMIN_USERS)?;
    let users = services
        .accounts
        .list_users()
        .await
        .map_err(errors::auth_error_to_response)?;
    Ok(Json(users).into_response())
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<UserDraft>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &ADMIN_USERS)?;
    let Json(draft) = body.map_err(errors::json_rejection_to_response)?;
    let user = services
        .accounts
        .register(draft)
        .await
        .map_err(errors::auth_error_to_response)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// Name, email and role; `password` is optional and re-hashed when given.
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<UserDraft>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &ADMIN_USERS)?;
    let id: UserId = errors::parse_id(&id)?;
    let Json(draft) = body.map_err(errors::json_rejection_to_response)?;
    let user = services
        .accounts
        .update_user(id, draft)
        .await
        .map_err(errors::auth_error_to_response)?;
    Ok(Json(user).into_response())
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    require(&principal, &ADMIN_USERS)?;
    let id: UserId = errors::parse_id(&id)?;
    services
        .accounts
        .delete_user(id)
        .await
        .map_err(errors::auth_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn all_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, Response> {
    require(&principal, &ADMIN_SALES)?;
    let sales = services
        .ledger
        .list_sales()
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(sales).into_response())
}
