//! NATS topic sink.
//!
//! One message per envelope on a fixed subject. Every subscriber of the
//! subject gets a copy. The generated message id travels in the
//! `Nats-Msg-Id` header so consumers can tag their audit records with it.

use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use uuid::Uuid;

use super::{DeliveryError, DeliveryReceipt, EventSink};
use crate::domain::events::Envelope;

pub const MESSAGE_ID_HEADER: &str = "Nats-Msg-Id";

#[derive(Clone, Debug)]
pub struct NatsTopicSink {
    client: Client,
    subject: String,
}

impl NatsTopicSink {
    pub fn new(client: Client, subject: impl Into<String>) -> Self {
        Self { client, subject: subject.into() }
    }
}

#[async_trait]
impl EventSink for NatsTopicSink {
    async fn deliver(&self, envelope: &Envelope) -> Result<DeliveryReceipt, DeliveryError> {
        let body = envelope.to_json()?;
        let message_id = Uuid::new_v4().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(MESSAGE_ID_HEADER, message_id.as_str());
        self.client
            .publish_with_headers(self.subject.clone(), headers, body.into_bytes().into())
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        // Surface connection problems now rather than on some later publish.
        self.client.flush().await.map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(DeliveryReceipt { message_id })
    }
}
