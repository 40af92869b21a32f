use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{error::ProviderError, model::Reading};

use super::WeatherProvider;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    /// `timeout` bounds the whole upstream request, connect included.
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_current(&self, city: &str) -> Result<Reading, ProviderError> {
        let url = format!("{}/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "OpenWeather request failed");
        }

        reading_from_response(city, status, &body)
    }
}

/// Map an OpenWeather "current weather" response onto a pending reading.
///
/// The requested `city` is kept verbatim as the query key; the provider's
/// own location name is ignored.
pub fn reading_from_response(
    city: &str,
    status: StatusCode,
    body: &str,
) -> Result<Reading, ProviderError> {
    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::CityNotFound(city.to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
        });
    }

    let parsed: OwCurrentResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    let condition = parsed
        .weather
        .first()
        .map(|w| w.main.clone())
        .ok_or_else(|| {
            ProviderError::MalformedResponse("response contained no weather conditions".to_string())
        })?;

    Ok(Reading::pending(city, parsed.main.temp, condition))
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, city: &str) -> Result<Reading, ProviderError> {
        if city.trim().is_empty() {
            return Err(ProviderError::EmptyCity);
        }
        self.fetch_current(city).await
    }
}

fn truncate_body(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
