//! Weather and air-quality comparison service.
//!
//! Forecasts come from Open-Meteo through a retrying client and a shared TTL
//! cache; [`location::LocationService`] exposes per-coordinate readings and
//! weekly aggregates, and [`recommendation`] compares two locations.

pub mod aggregator;
pub mod api_client;
pub mod cache;
pub mod config;
pub mod districts;
pub mod geo;
pub mod handlers;
pub mod location;
pub mod openapi;
pub mod recommendation;
pub mod refresh;
pub mod series;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: handlers::AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/recommendation", get(handlers::recommend))
        .route("/api/locations/summary", get(handlers::location_summary))
        .route("/api/districts", get(handlers::list_districts))
        .route("/api/districts/top", get(handlers::top_districts))
        .route("/api/districts/refresh", post(handlers::refresh_districts))
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
