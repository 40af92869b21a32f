use crate::{Config, error::ProviderError, model::Reading, provider::openweather::OpenWeatherProvider};
use async_trait::async_trait;
use std::sync::Arc;

pub mod openweather;

/// Source of current weather for a city.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Returns a pending reading (no `id`, no `created_at`) for `city`.
    async fn current(&self, city: &str) -> Result<Reading, ProviderError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.openweather_api_key()?;

    let provider = OpenWeatherProvider::new(
        api_key.to_owned(),
        config.openweather_base_url.clone(),
        config.request_timeout(),
    )?;

    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).err().expect("missing key must fail");
        assert!(err.to_string().contains("No OpenWeather API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let cfg = Config {
            openweather_api_key: Some("KEY".to_string()),
            ..Config::default()
        };

        assert!(provider_from_config(&cfg).is_ok());
    }
}
