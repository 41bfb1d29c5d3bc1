//! `/orders` handlers

use axum::{extract::{Query, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use validator::Validate;

use super::{ApiError, AppState, CorrelationId, JsonBody};
use crate::domain::aggregates::{Order, Shipping};
use crate::domain::events::EventType;
use crate::domain::value_objects::PaymentMethod;

const MISSING: &str = "Order not found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub email: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub product_ids: Vec<String>,
    pub payment: PaymentMethod,
    pub shipping: Shipping,
}

/// `GET /orders` lists everything, `?email` one customer, `?email&orderId` one order.
pub async fn get_orders(State(s): State<AppState>, Query(q): Query<OrderQuery>) -> Result<Response, ApiError> {
    let missing = |e| ApiError::from_repository(e, MISSING);
    match (q.email, q.order_id) {
        (None, None) => Ok(Json(s.orders.list_all().await.map_err(missing)?).into_response()),
        (Some(email), None) => Ok(Json(s.orders.list_by_email(&email).await.map_err(missing)?).into_response()),
        (Some(email), Some(id)) => Ok(Json(s.orders.get_one(&email, &id).await.map_err(missing)?).into_response()),
        (None, Some(_)) => Err(ApiError::BadRequest("orderId requires email".into())),
    }
}

pub async fn create_order(State(s): State<AppState>, CorrelationId(request_id): CorrelationId, JsonBody(r): JsonBody<OrderRequest>) -> Result<(StatusCode, Json<Order>), ApiError> {
    r.validate()?;
    let products = s.products.get_by_ids(&r.product_ids).await
        .map_err(|e| ApiError::from_repository(e, "Some product was not found"))?;
    let order = Order::place(r.email, r.shipping, r.payment, &products)?;
    let order = s.orders.create(order).await.map_err(|e| ApiError::from_repository(e, MISSING))?;
    let outcome = s.order_events.publish_order(&order, EventType::OrderCreated, &request_id).await;
    s.settle_delivery(outcome, "order")?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn delete_order(State(s): State<AppState>, CorrelationId(request_id): CorrelationId, Query(q): Query<OrderQuery>) -> Result<Json<Order>, ApiError> {
    let (Some(email), Some(id)) = (q.email, q.order_id) else {
        return Err(ApiError::BadRequest("email and orderId are required".into()));
    };
    let order = s.orders.delete(&email, &id).await.map_err(|e| ApiError::from_repository(e, MISSING))?;
    let outcome = s.order_events.publish_order(&order, EventType::OrderDeleted, &request_id).await;
    s.settle_delivery(outcome, "order")?;
    Ok(Json(order))
}
