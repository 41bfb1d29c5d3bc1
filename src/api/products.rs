//! `/products` handlers

use axum::{extract::{Path, State}, http::{HeaderMap, StatusCode}, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::{ApiError, AppState, CorrelationId, JsonBody};
use crate::domain::aggregates::Product;
use crate::domain::events::EventType;
use crate::domain::value_objects::non_negative_price;

pub const ACTOR_EMAIL_HEADER: &str = "x-actor-email";
const MISSING: &str = "Product not found";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    #[validate(length(min = 1))]
    pub product_name: String,
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(custom = "non_negative_price")]
    pub price: Decimal,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub product_url: String,
}

impl From<ProductRequest> for Product {
    fn from(r: ProductRequest) -> Self {
        Product::new(r.product_name, r.code, r.price).with_model(r.model).with_url(r.product_url)
    }
}

fn actor_email(headers: &HeaderMap, state: &AppState) -> String {
    headers.get(ACTOR_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.settings.default_actor_email.clone())
}

pub async fn list_products(State(s): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = s.products.get_all().await.map_err(|e| ApiError::from_repository(e, MISSING))?;
    Ok(Json(products))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>, ApiError> {
    s.products.get_by_id(&id).await.map(Json).map_err(|e| ApiError::from_repository(e, MISSING))
}

pub async fn create_product(State(s): State<AppState>, CorrelationId(request_id): CorrelationId, headers: HeaderMap, JsonBody(r): JsonBody<ProductRequest>) -> Result<(StatusCode, Json<Product>), ApiError> {
    r.validate()?;
    let product = s.products.create(r.into()).await.map_err(|e| ApiError::from_repository(e, MISSING))?;
    let outcome = s.product_events.publish_product(&product, EventType::ProductCreated, &request_id, &actor_email(&headers, &s)).await;
    s.settle_delivery(outcome, "product")?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<String>, CorrelationId(request_id): CorrelationId, headers: HeaderMap, JsonBody(r): JsonBody<ProductRequest>) -> Result<Json<Product>, ApiError> {
    r.validate()?;
    let product = s.products.update(&id, r.into()).await.map_err(|e| ApiError::from_repository(e, MISSING))?;
    let outcome = s.product_events.publish_product(&product, EventType::ProductUpdated, &request_id, &actor_email(&headers, &s)).await;
    s.settle_delivery(outcome, "product")?;
    Ok(Json(product))
}

pub async fn delete_product(State(s): State<AppState>, Path(id): Path<String>, CorrelationId(request_id): CorrelationId, headers: HeaderMap) -> Result<Json<Product>, ApiError> {
    let product = s.products.delete_by_id(&id).await.map_err(|e| ApiError::from_repository(e, MISSING))?;
    let outcome = s.product_events.publish_product(&product, EventType::ProductDeleted, &request_id, &actor_email(&headers, &s)).await;
    s.settle_delivery(outcome, "product")?;
    Ok(Json(product))
}
