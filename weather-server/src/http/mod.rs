//! HTTP surface of both services.

use axum::{
    Json, Router,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;
use weather_core::{HistoryError, ProviderError};

pub mod history;
pub mod ingest;

/// Error response rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::CityNotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "City not found"),
            ProviderError::EmptyCity => ApiError::new(StatusCode::BAD_REQUEST, err.to_string()),
            ProviderError::Unavailable(_) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Weather service unavailable")
            }
            ProviderError::Status { status } => ApiError::new(
                StatusCode::BAD_GATEWAY,
                format!("Weather data not available (upstream status {status})"),
            ),
            ProviderError::MalformedResponse(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error parsing weather data")
            }
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::InvalidReading(msg) => ApiError::new(StatusCode::BAD_REQUEST, msg),
            HistoryError::Storage(e) => {
                error!(error = %e, "History storage failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error accessing history")
            }
        }
    }
}

/// CORS and request tracing shared by both services.
pub fn with_common_layers(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use http_body_util::BodyExt;

    pub async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
