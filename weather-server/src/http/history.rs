use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use tracing::debug;
use weather_core::{HistoryService, NewReading, Reading};

use super::{ApiError, with_common_layers};

pub fn router(service: HistoryService) -> Router {
    let routes = Router::new()
        .route("/api/v1/history", post(create_history))
        .route("/api/v1/history/cities/{city}", get(get_city_history))
        .with_state(service);

    with_common_layers(routes)
}

/// Store a reading directly, bypassing the event bus.
async fn create_history(
    State(service): State<HistoryService>,
    payload: Result<Json<NewReading>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>), ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Rejected history payload");
        ApiError::new(StatusCode::BAD_REQUEST, "Invalid request payload")
    })?;

    let stored = service.record(input).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// The latest readings for a city, newest first.
async fn get_city_history(
    State(service): State<HistoryService>,
    Path(city): Path<String>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let readings = service.recent(&city).await?;
    Ok(Json(readings))
}
