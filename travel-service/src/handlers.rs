use axum::{extract::State, response::Json};
use axum_extra::extract::Query;
use chrono::{Local, NaiveDate};
use common::errors::AppError;
use common::models::{DistrictSummary, RecommendationResult, RefreshReport, WeeklySummary};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::api_client::OpenMeteoClient;
use crate::districts::DistrictRegistry;
use crate::location::LocationService;
use crate::recommendation;
use crate::refresh::RefreshTask;

const DEFAULT_TOP_LIMIT: usize = 10;
const MAX_TOP_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<OpenMeteoClient>,
    pub registry: Arc<DistrictRegistry>,
    pub refresh: Arc<RefreshTask>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health check")
    )
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "travel-service" }))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub current_lat: f64,
    pub current_lon: f64,
    pub destination_district: Option<u32>,
    pub destination_lat: Option<f64>,
    pub destination_lon: Option<f64>,
    pub travel_date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/recommendation",
    params(
        ("current_lat" = f64, Query, description = "Current latitude (-90..90)"),
        ("current_lon" = f64, Query, description = "Current longitude (-180..180)"),
        ("destination_district" = Option<u32>, Query, description = "Destination district id"),
        ("destination_lat" = Option<f64>, Query, description = "Destination latitude, when no district is given"),
        ("destination_lon" = Option<f64>, Query, description = "Destination longitude, when no district is given"),
        ("travel_date" = String, Query, description = "Travel date (YYYY-MM-DD), today or later")
    ),
    responses(
        (status = 200, description = "Travel recommendation", body = RecommendationResult),
        (status = 400, description = "Invalid coordinates or travel date"),
        (status = 404, description = "Unknown destination district"),
        (status = 502, description = "Forecast provider rejected the request"),
        (status = 503, description = "Forecast provider unavailable")
    ),
    tag = "recommendation"
)]
pub async fn recommend(
    State(state): State<AppState>,
    Query(params): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResult>, AppError> {
    info!(travel_date = %params.travel_date, "Recommendation request received");

    if params.travel_date < Local::now().date_naive() {
        return Err(AppError::validation("travel_date cannot be in the past"));
    }

    let current = LocationService::at(params.current_lat, params.current_lon, state.client.clone())?;
    let destination = resolve_destination(&state, &params).await?;

    let result = recommendation::recommend(&current, &destination, params.travel_date).await?;

    Ok(Json(result))
}

async fn resolve_destination(
    state: &AppState,
    params: &RecommendationQuery,
) -> Result<LocationService, AppError> {
    if let Some(id) = params.destination_district {
        let district = state
            .registry
            .get(id)
            .await
            .ok_or_else(|| AppError::not_found(format!("district {}", id)))?;
        return Ok(
            LocationService::at(district.latitude, district.longitude, state.client.clone())?
                .with_label(district.name),
        );
    }

    match (params.destination_lat, params.destination_lon) {
        (Some(lat), Some(lon)) => LocationService::at(lat, lon, state.client.clone()),
        _ => Err(AppError::validation(
            "provide destination_district or both destination_lat and destination_lon",
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub lat: f64,
    pub lon: f64,
}

#[utoipa::path(
    get,
    path = "/api/locations/summary",
    params(
        ("lat" = f64, Query, description = "Latitude (-90..90)"),
        ("lon" = f64, Query, description = "Longitude (-180..180)")
    ),
    responses(
        (status = 200, description = "Weekly 2 PM temperature and PM2.5 averages", body = WeeklySummary),
        (status = 400, description = "Invalid coordinates"),
        (status = 503, description = "Forecast provider unavailable")
    ),
    tag = "locations"
)]
pub async fn location_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryQuery>,
) -> Result<Json<WeeklySummary>, AppError> {
    let location = LocationService::at(params.lat, params.lon, state.client.clone())?;
    let summary = location.weekly_summary().await?;

    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/api/districts",
    responses(
        (status = 200, description = "All districts with their latest averages", body = Vec<DistrictSummary>)
    ),
    tag = "districts"
)]
pub async fn list_districts(State(state): State<AppState>) -> Json<Vec<DistrictSummary>> {
    Json(state.registry.all().await)
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/districts/top",
    params(
        ("limit" = Option<usize>, Query, description = "How many districts to return (default 10)")
    ),
    responses(
        (status = 200, description = "Coolest and cleanest districts first", body = Vec<DistrictSummary>)
    ),
    tag = "districts"
)]
pub async fn top_districts(
    State(state): State<AppState>,
    Query(params): Query<TopQuery>,
) -> Json<Vec<DistrictSummary>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_TOP_LIMIT)
        .clamp(1, MAX_TOP_LIMIT);

    Json(state.registry.top(limit).await)
}

#[utoipa::path(
    post,
    path = "/api/districts/refresh",
    responses(
        (status = 200, description = "Refresh pass completed", body = RefreshReport),
        (status = 409, description = "A refresh pass is already running")
    ),
    tag = "districts"
)]
pub async fn refresh_districts(
    State(state): State<AppState>,
) -> Result<Json<RefreshReport>, AppError> {
    info!("Manual district refresh requested");

    let report = state
        .refresh
        .run_once()
        .await
        .ok_or_else(|| AppError::conflict("a refresh pass is already running"))?;

    Ok(Json(report))
}
