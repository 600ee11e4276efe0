use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use common::models::{
    Coordinate, DistrictSummary, LocationMetrics, Magnitude, RecommendationResult, RefreshReport,
    Verdict, WeeklySummary,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::recommend,
        handlers::location_summary,
        handlers::list_districts,
        handlers::top_districts,
        handlers::refresh_districts,
    ),
    components(schemas(
        RecommendationResult,
        LocationMetrics,
        Verdict,
        Magnitude,
        WeeklySummary,
        DistrictSummary,
        RefreshReport,
        Coordinate,
    )),
    tags(
        (name = "recommendation", description = "Travel recommendation between two locations"),
        (name = "locations", description = "Weekly forecast aggregates for a coordinate"),
        (name = "districts", description = "District averages refreshed periodically"),
    ),
)]
struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
