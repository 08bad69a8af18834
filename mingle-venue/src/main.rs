use std::sync::Arc;

use mingle_shared::clients::rabbitmq::RabbitMQClient;
use mingle_venue::clock::SystemClock;
use mingle_venue::config::{AppConfig, StorageBackend};
use mingle_venue::contact::ChatLinkBuilder;
use mingle_venue::events::EventPublisher;
use mingle_venue::store::{postgres, MemoryStore, PgStore, Store};
use mingle_venue::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mingle_shared::middleware::init_tracing("mingle-venue");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = match mingle_shared::middleware::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics exporter unavailable");
            None
        }
    };

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let pool = postgres::create_pool(&config.database_url, config.pool_size)?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory store, state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // The broker is optional: the core keeps serving when it is down.
    let events = if config.events_enabled() {
        match RabbitMQClient::connect(&config.rabbitmq_url).await {
            Ok(client) => EventPublisher::new(client),
            Err(e) => {
                tracing::warn!(error = %e, "RabbitMQ unavailable, events disabled");
                EventPublisher::disabled()
            }
        }
    } else {
        EventPublisher::disabled()
    };

    let links = Arc::new(ChatLinkBuilder::new(&config.contact_link_base)?);

    tracing::info!(
        storage = ?config.storage,
        feed_privacy = ?config.feed_privacy,
        "venue core configured"
    );

    let state = AppState::new(store, config, Arc::new(SystemClock), events, links, metrics_handle);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "mingle-venue starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
