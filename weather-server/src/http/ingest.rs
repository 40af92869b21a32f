use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use weather_core::{IngestService, Reading};

use super::{ApiError, with_common_layers};

pub fn router(service: IngestService) -> Router {
    let routes = Router::new()
        .route("/api/v1/weather/cities/{city}", get(get_city_weather))
        .with_state(service);

    with_common_layers(routes)
}

/// Fetch current weather for a city; persistence happens asynchronously.
async fn get_city_weather(
    State(service): State<IngestService>,
    Path(city): Path<String>,
) -> Result<Json<Reading>, ApiError> {
    let reading = service.fetch_and_publish(&city).await?;
    Ok(Json(reading))
}
