//! Runtime configuration, read from the environment after `.env` is loaded.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::ApiSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string; in-memory stores when unset.
    pub database_url: Option<String>,
    /// NATS server; order events are recorded in-process when unset.
    pub nats_url: Option<String>,
    pub order_events_subject: String,
    pub api: ApiSettings,
    pub purge_interval: Duration,
    pub recorder_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = ApiSettings::default();
        Ok(Self {
            port: var("PORT").map(|v| v.parse()).transpose().context("PORT must be a port number")?.unwrap_or(8083),
            database_url: var("DATABASE_URL"),
            nats_url: var("NATS_URL"),
            order_events_subject: var("ORDER_EVENTS_SUBJECT").unwrap_or_else(|| "order-events".to_string()),
            api: ApiSettings {
                audit_delivery_required: var("AUDIT_DELIVERY_REQUIRED")
                    .map(|v| v.parse()).transpose().context("AUDIT_DELIVERY_REQUIRED must be true or false")?
                    .unwrap_or(defaults.audit_delivery_required),
                default_actor_email: var("DEFAULT_ACTOR_EMAIL").unwrap_or(defaults.default_actor_email),
            },
            purge_interval: Duration::from_secs(
                var("PURGE_INTERVAL_SECS").map(|v| v.parse()).transpose().context("PURGE_INTERVAL_SECS must be a number")?.unwrap_or(60),
            ),
            recorder_batch_size: var("RECORDER_BATCH_SIZE").map(|v| v.parse()).transpose().context("RECORDER_BATCH_SIZE must be a number")?.unwrap_or(10),
        })
    }
}
