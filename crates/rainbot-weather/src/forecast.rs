use std::time::Duration;

use async_trait::async_trait;
use rainbot_core::config::ForecastConfig;
use rainbot_core::types::ForecastSummary;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, WeatherError};
use crate::wmo;

/// Today's forecast for a point.
#[async_trait]
pub trait ForecastClient: Send + Sync {
    async fn today(&self, lat: f64, lng: f64) -> Result<ForecastSummary>;
}

/// Open-Meteo daily forecast client. No API key required.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(&ForecastConfig {
            base_url: base_url.to_string(),
            ..ForecastConfig::default()
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    daily: OmDaily,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    #[serde(default)]
    weather_code: Vec<Option<u16>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
}

#[async_trait]
impl ForecastClient for OpenMeteoClient {
    async fn today(&self, lat: f64, lng: f64) -> Result<ForecastSummary> {
        let url = format!("{}/v1/forecast", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("daily", "weather_code,temperature_2m_max".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(WeatherError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: OmResponse =
            serde_json::from_str(&body).map_err(|e| WeatherError::Decode(e.to_string()))?;
        let code = parsed
            .daily
            .weather_code
            .first()
            .copied()
            .flatten()
            .ok_or(WeatherError::EmptyForecast)?;
        let high_c = parsed
            .daily
            .temperature_2m_max
            .first()
            .copied()
            .flatten()
            .ok_or(WeatherError::EmptyForecast)?;

        debug!(lat, lng, code, high_c, "forecast fetched");
        Ok(ForecastSummary {
            code,
            description: wmo::describe(code).to_string(),
            high_c,
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
