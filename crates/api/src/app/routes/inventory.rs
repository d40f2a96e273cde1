use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use tillpoint_auth::permissions::{INVENTORY_READ, INVENTORY_WRITE};
use tillpoint_auth::Principal;
use tillpoint_core::ProductId;
use tillpoint_inventory::{Product, ProductDraft};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// All products (newest first) plus the low-stock subset.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, Response> {
    require(&principal, &INVENTORY_READ)?;

    let products = services
        .products
        .list_products()
        .await
        .map_err(errors::store_error_to_response)?;
    let low_stock = services
        .products
        .low_stock(services.low_stock_threshold)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok(Json(dto::InventoryOverview {
        products,
        low_stock,
    })
    .into_response())
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &INVENTORY_WRITE)?;
    let Json(draft) = body.map_err(errors::json_rejection_to_response)?;
    let new = draft.validate().map_err(errors::domain_error_to_response)?;

    let product = Product::create(ProductId::new(), new, Utc::now());
    services
        .products
        .create_product(&product)
        .await
        .map_err(errors::store_error_to_response)?;

    tracing::info!(product_id = %product.id, name = %product.name, "product added");
    Ok((StatusCode::CREATED, Json(product)).into_response())
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    require(&principal, &INVENTORY_READ)?;
    let id: ProductId = errors::parse_id(&id)?;

    let product = services
        .products
        .get_product(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(product).into_response())
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> Result<Response, Response> {
    require(&principal, &INVENTORY_WRITE)?;
    let id: ProductId = errors::parse_id(&id)?;
    let Json(draft) = body.map_err(errors::json_rejection_to_response)?;
    let changes = draft.validate().map_err(errors::domain_error_to_response)?;

    let mut product = services
        .products
        .get_product(id)
        .await
        .map_err(errors::store_error_to_response)?;
    product.revise(changes);
    services
        .products
        .update_product(&product)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok(Json(product).into_response())
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    require(&principal, &INVENTORY_WRITE)?;
    let id: ProductId = errors::parse_id(&id)?;

    services
        .products
        .delete_product(id)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
