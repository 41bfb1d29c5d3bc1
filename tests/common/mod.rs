#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::{Request, StatusCode}, Router};
use serde_json::Value;
use storefront_audit::{
    domain::events::Envelope,
    publisher::{DeliveryError, DeliveryReceipt, EventPublisher, EventSink},
    repository::{OrderRepository, ProductRepository},
    router,
    store::{KeyedStore, MemoryStore, TableSchema},
    ApiSettings, AppState,
};
use tokio::sync::Mutex;
use tower::ServiceExt;

/// Sink that keeps every envelope it is given.
#[derive(Default)]
pub struct CapturingSink {
    pub envelopes: Mutex<Vec<Envelope>>,
}

#[async_trait]
impl EventSink for CapturingSink {
    async fn deliver(&self, envelope: &Envelope) -> Result<DeliveryReceipt, DeliveryError> {
        let mut envelopes = self.envelopes.lock().await;
        envelopes.push(envelope.clone());
        Ok(DeliveryReceipt { message_id: format!("msg-{}", envelopes.len()) })
    }
}

pub struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn deliver(&self, _: &Envelope) -> Result<DeliveryReceipt, DeliveryError> {
        Err(DeliveryError::Transport("topic unavailable".into()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub products: Arc<dyn KeyedStore>,
    pub orders: Arc<dyn KeyedStore>,
}

pub fn app_with(product_sink: Arc<dyn EventSink>, order_sink: Arc<dyn EventSink>, settings: ApiSettings) -> TestApp {
    let products: Arc<dyn KeyedStore> = Arc::new(MemoryStore::new(TableSchema::products()));
    let orders: Arc<dyn KeyedStore> = Arc::new(MemoryStore::new(TableSchema::orders()));
    let state = AppState {
        products: ProductRepository::new(products.clone()),
        orders: OrderRepository::new(orders.clone()),
        product_events: EventPublisher::new(product_sink),
        order_events: EventPublisher::new(order_sink),
        settings,
    };
    TestApp { router: router(state), products, orders }
}

pub fn app(sink: Arc<CapturingSink>) -> TestApp {
    app_with(sink.clone(), sink, ApiSettings::default())
}

pub async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}
