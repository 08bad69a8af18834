pub mod clock;
pub mod config;
pub mod contact;
pub mod error;
pub mod events;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use clock::Clock;
use config::AppConfig;
use contact::ContactLinkBuilder;
use events::EventPublisher;
use services::Services;
use store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub services: Services,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub events: EventPublisher,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        config: AppConfig,
        clock: Arc<dyn Clock>,
        events: EventPublisher,
        links: Arc<dyn ContactLinkBuilder>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Arc<Self> {
        let services = Services::new(
            store.clone(),
            events.clone(),
            links,
            config.feed_privacy,
            &config.contact_link_message,
        );
        Arc::new(Self {
            store,
            services,
            config,
            clock,
            events,
            metrics_handle,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    use routes::{attendance, blocks, feed, health, interactions, matches, profiles, sessions, venues};

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/venues", post(venues::create_venue))
        .route(
            "/venues/:venue_id/session",
            get(sessions::get_active_session).post(sessions::start_session),
        )
        .route("/venues/:venue_id/sessions", get(sessions::list_sessions))
        .route("/sessions/:session_id/extend", post(sessions::extend_session))
        .route("/sessions/:session_id/deactivate", post(sessions::deactivate_session))
        .route("/venues/:venue_id/attendance", post(attendance::enter_venue))
        .route("/attendance", delete(attendance::exit_venue))
        .route("/venues/:venue_id/feed", get(feed::get_feed))
        .route("/interactions", post(interactions::send_interaction))
        .route("/interactions/incoming", get(interactions::list_incoming))
        .route("/interactions/:id/respond", put(interactions::respond_interaction))
        .route("/matches", get(matches::list_matches))
        .route("/matches/:id", delete(matches::unmatch))
        .route(
            "/blocks/:profile_id",
            post(blocks::block_profile).delete(blocks::unblock_profile),
        )
        .route("/me", get(profiles::get_profile).post(profiles::ensure_profile))
        .route("/me/privacy", patch(profiles::set_privacy))
        .route("/me/feed-visibility", patch(profiles::set_feed_visibility))
        .route(
            "/profiles/:id/suspension",
            post(profiles::suspend_profile).delete(profiles::lift_suspension),
        )
        .layer(axum::middleware::from_fn(mingle_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
