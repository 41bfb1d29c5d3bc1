//! Direct invocation sink.
//!
//! Hands each envelope straight to an in-process [`EventRecorder`] on a
//! spawned task and returns as soon as the task is queued, the same way an
//! asynchronous function invocation is acknowledged before it runs.
//!
//! The recording task is detached: work still queued when the runtime shuts
//! down is lost, and a failed recording only shows up in the log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use super::{DeliveryError, DeliveryReceipt, EventSink};
use crate::domain::events::Envelope;
use crate::recorder::{Delivery, EventRecorder};

#[derive(Clone)]
pub struct DirectInvocationSink {
    recorder: Arc<EventRecorder>,
}

impl DirectInvocationSink {
    pub fn new(recorder: Arc<EventRecorder>) -> Self { Self { recorder } }
}

#[async_trait]
impl EventSink for DirectInvocationSink {
    async fn deliver(&self, envelope: &Envelope) -> Result<DeliveryReceipt, DeliveryError> {
        let delivery = Delivery { message_id: Uuid::new_v4().to_string(), body: envelope.to_json()? };
        let receipt = DeliveryReceipt { message_id: delivery.message_id.clone() };
        let recorder = self.recorder.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.record(&delivery).await {
                error!(message_id = %delivery.message_id, error = %e, "direct invocation failed");
            }
        });
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventType;
    use crate::store::{KeyedStore, MemoryStore, TableSchema};

    #[tokio::test]
    async fn test_failed_recording_is_not_reported_to_caller() {
        let store = Arc::new(MemoryStore::new(TableSchema::events()));
        let sink = DirectInvocationSink::new(Arc::new(EventRecorder::new(store.clone())));
        let envelope = Envelope::new(EventType::ProductCreated, &serde_json::json!({"unexpected": true})).unwrap();
        let receipt = sink.deliver(&envelope).await.unwrap();
        assert!(!receipt.message_id.is_empty());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(store.scan().await.unwrap().is_empty());
    }
}
