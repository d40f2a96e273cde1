use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};

use tillpoint_auth::permissions::{SALES_CHECKOUT, SALES_READ};
use tillpoint_auth::Principal;
use tillpoint_core::{CustomerId, ProductId};
use tillpoint_sales::CheckoutRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/history", get(history))
        .route("/summary/today", get(summary_today))
        .route("/summary/:date", get(summary_for_date))
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<dto::CheckoutRequestBody>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &SALES_CHECKOUT)?;
    let Json(body) = body.map_err(errors::json_rejection_to_response)?;

    let customer_id: CustomerId = errors::parse_id(&body.customer_id)?;
    let lines = body
        .items
        .iter()
        .map(|item| -> Result<(ProductId, i64), Response> {
            Ok((errors::parse_id(&item.product_id)?, item.quantity_sold))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let request =
        CheckoutRequest::new(customer_id, lines).map_err(errors::checkout_error_to_response)?;
    let receipt = services
        .checkout
        .checkout(request)
        .await
        .map_err(errors::checkout_error_to_response)?;

    Ok(Json(dto::CheckoutResponse {
        message: "sale completed",
        receipt,
    })
    .into_response())
}

/// Every sale line, newest first, with product and customer names.
pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, Response> {
    require(&principal, &SALES_READ)?;
    let sales = services
        .ledger
        .list_sales()
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(sales).into_response())
}

pub async fn summary_today(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, Response> {
    require(&principal, &SALES_READ)?;
    summary(&services, Utc::now().date_naive()).await
}

pub async fn summary_for_date(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(date): Path<String>,
) -> Result<Response, Response> {
    require(&principal, &SALES_READ)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid date '{date}', expected YYYY-MM-DD"),
        )
    })?;
    summary(&services, date).await
}

async fn summary(services: &AppServices, date: NaiveDate) -> Result<Response, Response> {
    let summary = services
        .ledger
        .summary_for_date(date)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(summary).into_response())
}
