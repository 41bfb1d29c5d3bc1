//! Storefront audit service
//!
//! Products and orders CRUD over a keyed document store, with an
//! asynchronous audit trail of every mutation.
//!
//! ## Features
//! - Product catalog and order management
//! - Order/product events wrapped in a typed envelope
//! - Topic (NATS) or direct in-process delivery of events
//! - Append-only audit records that expire after five minutes

pub mod api;
pub mod config;
pub mod domain;
pub mod publisher;
pub mod recorder;
pub mod repository;
pub mod store;

pub use api::{router, ApiSettings, AppState};
pub use config::Config;
pub use recorder::EventRecorder;
