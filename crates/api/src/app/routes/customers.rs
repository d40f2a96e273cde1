use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use tillpoint_auth::permissions::{CUSTOMERS_READ, CUSTOMERS_WRITE};
use tillpoint_auth::Principal;
use tillpoint_core::CustomerId;
use tillpoint_customers::{Customer, CustomerDraft};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, Response> {
    require(&principal, &CUSTOMERS_READ)?;
    let customers = services
        .customers
        .list_customers()
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(customers).into_response())
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<CustomerDraft>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &CUSTOMERS_WRITE)?;
    let Json(draft) = body.map_err(errors::json_rejection_to_response)?;
    let new = draft.validate().map_err(errors::domain_error_to_response)?;

    let customer = Customer::create(CustomerId::new(), new);
    services
        .customers
        .create_customer(&customer)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok((StatusCode::CREATED, Json(customer)).into_response())
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    require(&principal, &CUSTOMERS_READ)?;
    let id: CustomerId = errors::parse_id(&id)?;
    let customer = services
        .customers
        .get_customer(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(customer).into_response())
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<CustomerDraft>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &CUSTOMERS_WRITE)?;
    let id: CustomerId = errors::parse_id(&id)?;
    let Json(draft) = body.map_err(errors::json_rejection_to_response)?;
    let changes = draft.validate().map_err(errors::domain_error_to_response)?;

    let mut customer = services
        .customers
        .get_customer(id)
        .await
        .map_err(errors::store_error_to_response)?;
    customer.revise(changes);
    services
        .customers
        .update_customer(&customer)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok(Json(customer).into_response())
}

/// Rejected with 409 once the customer appears in the sales ledger.
pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    require(&principal, &CUSTOMERS_WRITE)?;
    let id: CustomerId = errors::parse_id(&id)?;
    services
        .customers
        .delete_customer(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
