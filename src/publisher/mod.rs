//! Event publishing.
//!
//! This module contains:
//! - `EventSink` trait: the delivery port handlers depend on
//! - `EventPublisher`: builds envelopes from mutated entities
//! - Sinks: `NatsTopicSink` (broadcast), `DirectInvocationSink` (in-process recorder)
//!
//! Publishing happens after the repository write has committed and is
//! attempted exactly once. The outcome goes back to the caller, which
//! decides whether a failed delivery matters for its response.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::aggregates::{Order, Product};
use crate::domain::events::{Envelope, EventType, OrderEvent, ProductEvent};

pub mod direct;
pub mod nats;

pub use direct::DirectInvocationSink;
pub use nats::NatsTopicSink;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport rejected envelope: {0}")]
    Transport(String),
}

/// Handle returned by a sink that accepted an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Asynchronous channel that accepts envelopes.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> Result<DeliveryReceipt, DeliveryError>;
}

#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self { Self { sink } }

    pub async fn publish_order(&self, order: &Order, event_type: EventType, request_id: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let envelope = Envelope::new(event_type, &OrderEvent::from_order(order, request_id))?;
        self.send(envelope).await
    }

    pub async fn publish_product(&self, product: &Product, event_type: EventType, request_id: &str, email: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let envelope = Envelope::new(event_type, &ProductEvent::from_product(product, event_type, request_id, email))?;
        self.send(envelope).await
    }

    async fn send(&self, envelope: Envelope) -> Result<DeliveryReceipt, DeliveryError> {
        match self.sink.deliver(&envelope).await {
            Ok(receipt) => {
                debug!(event_type = %envelope.event_type, message_id = %receipt.message_id, "event delivered");
                Ok(receipt)
            }
            Err(e) => {
                warn!(event_type = %envelope.event_type, error = %e, "event delivery failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Shipping;
    use crate::domain::events::DomainEvent;
    use crate::domain::value_objects::{Carrier, PaymentMethod, ShippingType};
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<Envelope>>);

    #[async_trait]
    impl EventSink for Captured {
        async fn deliver(&self, envelope: &Envelope) -> Result<DeliveryReceipt, DeliveryError> {
            let mut seen = self.0.lock().await;
            seen.push(envelope.clone());
            Ok(DeliveryReceipt { message_id: format!("m-{}", seen.len()) })
        }
    }

    struct Refusing;

    #[async_trait]
    impl EventSink for Refusing {
        async fn deliver(&self, _: &Envelope) -> Result<DeliveryReceipt, DeliveryError> {
            Err(DeliveryError::Transport("topic unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_publish_order_builds_envelope() {
        let sink = Arc::new(Captured::default());
        let publisher = EventPublisher::new(sink.clone());
        let shipping = Shipping { kind: ShippingType::Economic, carrier: Carrier::CarrierA };
        let mut order = Order::place("a@b.com", shipping, PaymentMethod::Cash, &[Product::new("A", "A1", Decimal::ONE)]).unwrap();
        order.id = "o-1".into();
        let receipt = publisher.publish_order(&order, EventType::OrderCreated, "req-9").await.unwrap();
        assert_eq!(receipt.message_id, "m-1");
        let seen = sink.0.lock().await;
        match seen[0].decode().unwrap() {
            DomainEvent::Order(e) => {
                assert_eq!(e.order_id, "o-1");
                assert_eq!(e.request_id, "req-9");
                assert_eq!(e.product_codes, vec!["A1".to_string()]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_product_carries_actor() {
        let sink = Arc::new(Captured::default());
        let publisher = EventPublisher::new(sink.clone());
        let product = Product { id: "p-1".into(), ..Product::new("Widget", "W1", Decimal::new(999, 2)) };
        publisher.publish_product(&product, EventType::ProductDeleted, "req-1", "ops@shop.test").await.unwrap();
        let seen = sink.0.lock().await;
        assert_eq!(seen[0].event_type, EventType::ProductDeleted);
        let DomainEvent::Product(e) = seen[0].decode().unwrap() else { panic!("expected a product event") };
        assert_eq!(e.email, "ops@shop.test");
        assert_eq!(e.product_code, "W1");
    }

    #[tokio::test]
    async fn test_failure_is_surfaced_not_retried() {
        let publisher = EventPublisher::new(Arc::new(Refusing));
        let product = Product::new("Widget", "W1", Decimal::ONE);
        let err = publisher.publish_product(&product, EventType::ProductCreated, "r", "e").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
