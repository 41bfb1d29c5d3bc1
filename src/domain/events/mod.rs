//! Domain events and the envelope they travel in.
//!
//! Producers serialize a domain event into [`Envelope::data`] and tag it with
//! an [`EventType`]. Consumers decode the envelope first and the payload
//! second, so both sides only have to agree on the envelope shape and on
//! the payload belonging to each event type.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use crate::domain::aggregates::{Billing, Order, Product, Shipping};

/// Seconds an audit record stays in the events table.
pub const AUDIT_RETENTION_SECS: i64 = 5 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    OrderCreated,
    OrderDeleted,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "ORDER_CREATED",
            Self::OrderDeleted => "ORDER_DELETED",
            Self::ProductCreated => "PRODUCT_CREATED",
            Self::ProductUpdated => "PRODUCT_UPDATED",
            Self::ProductDeleted => "PRODUCT_DELETED",
        }
    }

    pub fn is_order(&self) -> bool { matches!(self, Self::OrderCreated | Self::OrderDeleted) }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Transport wrapper: `{"eventType": "...", "data": "<json>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub event_type: EventType,
    pub data: String,
}

impl Envelope {
    pub fn new<T: Serialize>(event_type: EventType, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self { event_type, data: serde_json::to_string(payload)? })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> { serde_json::to_string(self) }

    pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(raw).map_err(DecodeError::Envelope)
    }

    pub fn decode(&self) -> Result<DomainEvent, DecodeError> {
        let payload_error = |source| DecodeError::Payload { event_type: self.event_type, source };
        if self.event_type.is_order() {
            serde_json::from_str(&self.data).map(DomainEvent::Order).map_err(payload_error)
        } else {
            serde_json::from_str(&self.data).map(DomainEvent::Product).map_err(payload_error)
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed {event_type} payload: {source}")]
    Payload { event_type: EventType, #[source] source: serde_json::Error },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Order(OrderEvent),
    Product(ProductEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub email: String,
    pub order_id: String,
    pub shipping: Shipping,
    pub billing: Billing,
    pub product_codes: Vec<String>,
    pub request_id: String,
}

impl OrderEvent {
    pub fn from_order(order: &Order, request_id: impl Into<String>) -> Self {
        Self {
            email: order.email.clone(), order_id: order.id.clone(),
            shipping: order.shipping.clone(), billing: order.billing.clone(),
            product_codes: order.product_codes(), request_id: request_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEvent {
    pub request_id: String,
    pub event_type: EventType,
    pub product_id: String,
    pub product_code: String,
    pub product_price: Decimal,
    pub email: String,
}

impl ProductEvent {
    pub fn from_product(product: &Product, event_type: EventType, request_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(), event_type, product_id: product.id.clone(),
            product_code: product.code.clone(), product_price: product.price, email: email.into(),
        }
    }
}

/// Append-only audit entry written by the recorder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub pk: String,
    pub sk: String,
    pub email: String,
    /// Processing time, epoch milliseconds.
    pub created_at: i64,
    pub request_id: String,
    pub event_type: EventType,
    /// Expiry, epoch seconds.
    pub ttl: i64,
    pub info: AuditInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum AuditInfo {
    #[serde(rename_all = "camelCase")]
    Order { message_id: String, order_id: String, product_codes: Vec<String> },
    #[serde(rename_all = "camelCase")]
    Product { product_id: String, price: Decimal },
}

impl AuditRecord {
    /// Builds the record for `event` as processed at `processed_at_ms`.
    /// Sort key and expiry derive from the processing time, not from when
    /// the event was raised.
    pub fn new(event: &DomainEvent, event_type: EventType, message_id: &str, processed_at_ms: i64) -> Self {
        let sk = format!("{}#{}", event_type, processed_at_ms);
        let ttl = processed_at_ms / 1000 + AUDIT_RETENTION_SECS;
        match event {
            DomainEvent::Order(e) => Self {
                pk: format!("#order_{}", e.order_id), sk, email: e.email.clone(),
                created_at: processed_at_ms, request_id: e.request_id.clone(), event_type, ttl,
                info: AuditInfo::Order { message_id: message_id.to_string(), order_id: e.order_id.clone(), product_codes: e.product_codes.clone() },
            },
            DomainEvent::Product(e) => Self {
                pk: format!("#product_{}", e.product_code), sk, email: e.email.clone(),
                created_at: processed_at_ms, request_id: e.request_id.clone(), event_type, ttl,
                info: AuditInfo::Product { product_id: e.product_id.clone(), price: e.product_price },
            },
        }
    }
}
