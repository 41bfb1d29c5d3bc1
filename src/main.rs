//! Storefront audit service - products, orders and their audit trail

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use storefront_audit::{
    publisher::{DirectInvocationSink, EventPublisher, EventSink, NatsTopicSink},
    repository::{OrderRepository, ProductRepository},
    router,
    store::{KeyedStore, MemoryStore, PgStore, TableSchema},
    AppState, Config, EventRecorder,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    products: Arc<dyn KeyedStore>,
    orders: Arc<dyn KeyedStore>,
    events: Arc<dyn KeyedStore>,
}

async fn open_stores(config: &Config) -> Result<Stores> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; using in-memory stores");
        return Ok(Stores {
            products: Arc::new(MemoryStore::new(TableSchema::products())),
            orders: Arc::new(MemoryStore::new(TableSchema::orders())),
            events: Arc::new(MemoryStore::new(TableSchema::events())),
        });
    };
    let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    Ok(Stores {
        products: Arc::new(PgStore::new(db.clone(), TableSchema::products())),
        orders: Arc::new(PgStore::new(db.clone(), TableSchema::orders())),
        events: Arc::new(PgStore::new(db, TableSchema::events())),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    let stores = open_stores(&config).await?;
    let recorder = Arc::new(EventRecorder::new(stores.events.clone()));

    let order_sink: Arc<dyn EventSink> = match &config.nats_url {
        Some(url) => {
            let client = async_nats::connect(url.as_str()).await?;
            let subscriber = client.subscribe(config.order_events_subject.clone()).await?;
            tokio::spawn(storefront_audit::recorder::consume(subscriber, recorder.clone(), config.recorder_batch_size));
            tracing::info!(subject = %config.order_events_subject, "order events go through NATS");
            Arc::new(NatsTopicSink::new(client, config.order_events_subject.clone()))
        }
        None => Arc::new(DirectInvocationSink::new(recorder.clone())),
    };

    let events = stores.events.clone();
    let purge_interval = config.purge_interval;
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(purge_interval);
        loop {
            tick.tick().await;
            match events.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "expired audit records removed"),
                Err(e) => tracing::warn!(error = %e, "audit purge failed"),
            }
        }
    });

    let state = AppState {
        products: ProductRepository::new(stores.products),
        orders: OrderRepository::new(stores.orders),
        product_events: EventPublisher::new(Arc::new(DirectInvocationSink::new(recorder))),
        order_events: EventPublisher::new(order_sink),
        settings: config.api.clone(),
    };

    let app = router(state);
    tracing::info!("🚀 Storefront audit listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
