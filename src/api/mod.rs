//! HTTP surface: products and orders CRUD.

use axum::{routing::get, Json, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::publisher::{DeliveryError, DeliveryReceipt, EventPublisher};
use crate::repository::{OrderRepository, ProductRepository};

pub mod body;
pub mod correlation;
pub mod error;
pub mod orders;
pub mod products;

pub use body::JsonBody;
pub use correlation::CorrelationId;
pub use error::ApiError;

#[derive(Clone, Debug)]
pub struct ApiSettings {
    /// When set, a failed audit delivery turns the response into a 502.
    /// The entity write is kept either way.
    pub audit_delivery_required: bool,
    /// Actor recorded on product events when the request names none.
    pub default_actor_email: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { audit_delivery_required: false, default_actor_email: "admin@storefront.local".to_string() }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub product_events: EventPublisher,
    pub order_events: EventPublisher,
    pub settings: ApiSettings,
}

impl AppState {
    /// Applies the delivery policy to a publish outcome.
    pub(crate) fn settle_delivery(&self, outcome: Result<DeliveryReceipt, DeliveryError>, entity: &str) -> Result<(), ApiError> {
        match outcome {
            Ok(receipt) => {
                info!(entity, message_id = %receipt.message_id, "audit event published");
                Ok(())
            }
            Err(e) if self.settings.audit_delivery_required => Err(ApiError::Delivery(e)),
            Err(e) => {
                warn!(entity, error = %e, "audit event not published; keeping the write");
                Ok(())
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-audit"})) }))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/:id", get(products::get_product).put(products::update_product).delete(products::delete_product))
        .route("/orders", get(orders::get_orders).post(orders::create_order).delete(orders::delete_order))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
