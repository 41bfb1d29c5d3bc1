//! Audit trail recorder.
//!
//! Consumes delivered envelopes and writes one [`AuditRecord`] per envelope
//! into the events table. Records are keyed and expired by processing time,
//! so a late delivery moves the retention window with it. Redelivery of the
//! same envelope writes another record; duplicates are tolerated.

use std::sync::Arc;

use chrono::Utc;
use futures::{future::join_all, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::events::{AuditRecord, DecodeError, Envelope};
use crate::publisher::nats::MESSAGE_ID_HEADER;
use crate::store::{to_document, Key, KeyedStore, StoreError};

const MAX_KEY_ATTEMPTS: usize = 1000;

/// One envelope as handed over by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    /// Envelope JSON.
    pub body: String,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("audit write failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct RecordOutcome {
    pub message_id: String,
    pub result: Result<Key, RecordError>,
}

impl RecordOutcome {
    pub fn is_ok(&self) -> bool { self.result.is_ok() }
}

pub struct EventRecorder {
    store: Arc<dyn KeyedStore>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self { Self { store } }

    /// Decodes `delivery` and appends its audit record. Returns the record key.
    pub async fn record(&self, delivery: &Delivery) -> Result<Key, RecordError> {
        self.record_at(delivery, Utc::now().timestamp_millis()).await
    }

    /// Records `delivery` as processed at `processed_at_ms`.
    ///
    /// The sort key carries the processing millisecond, so two records of the
    /// same entity and event type can claim the same key. The later one moves
    /// forward a millisecond at a time until it finds a free slot; `createdAt`
    /// and `ttl` follow the timestamp that was finally used.
    pub(crate) async fn record_at(&self, delivery: &Delivery, processed_at_ms: i64) -> Result<Key, RecordError> {
        let envelope = Envelope::from_json(&delivery.body)?;
        let event = envelope.decode()?;
        let mut at = processed_at_ms;
        for _ in 0..MAX_KEY_ATTEMPTS {
            let record = AuditRecord::new(&event, envelope.event_type, &delivery.message_id, at);
            let key = Key::composite(record.pk.clone(), record.sk.clone());
            match self.store.put_if_absent(to_document(&record)?).await {
                Ok(_) => {
                    info!(message_id = %delivery.message_id, event_type = %envelope.event_type, pk = %key.partition, "audit event recorded");
                    return Ok(key);
                }
                Err(StoreError::ConditionFailed) => {
                    debug!(message_id = %delivery.message_id, sk = %record.sk, "audit key taken, moving on");
                    at += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::ConditionFailed.into())
    }

    /// Records every delivery independently. Outcomes come back in input order;
    /// a failed item never stops its siblings.
    pub async fn record_batch(&self, deliveries: Vec<Delivery>) -> Vec<RecordOutcome> {
        let outcomes = join_all(deliveries.into_iter().map(|d| async move {
            let result = self.record(&d).await;
            if let Err(e) = &result {
                warn!(message_id = %d.message_id, error = %e, "audit event dropped");
            }
            RecordOutcome { message_id: d.message_id, result }
        }))
        .await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        if failed > 0 {
            warn!(total = outcomes.len(), failed, "batch recorded with failures");
        }
        outcomes
    }
}

/// Drains a topic subscription into `recorder`, grouping messages that are
/// already waiting into batches of at most `batch_size`.
pub async fn consume<S>(messages: S, recorder: Arc<EventRecorder>, batch_size: usize)
where
    S: Stream<Item = async_nats::Message> + Unpin,
{
    let mut batches = messages.ready_chunks(batch_size.max(1));
    while let Some(batch) = batches.next().await {
        let deliveries = batch.into_iter().map(delivery_from_message).collect();
        recorder.record_batch(deliveries).await;
    }
    info!("order events subscription closed");
}

fn delivery_from_message(message: async_nats::Message) -> Delivery {
    let message_id = message.headers.as_ref()
        .and_then(|h| h.get(MESSAGE_ID_HEADER))
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Delivery { message_id, body: String::from_utf8_lossy(&message.payload).into_owned() }
}
