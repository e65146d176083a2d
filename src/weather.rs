//! Current-weather lookup against the OpenWeatherMap REST API.
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSummary {
    pub description: String,
    pub temp: f64,
    pub feels_like: f64,
    pub precipitation_mm: Option<f64>,
}

#[derive(Debug, Error)]
pub enum WeatherFetchError {
    #[error("weather API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to reach weather API: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed weather payload: {0}")]
    Malformed(String),
    #[error("invalid weather API URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherSummary, WeatherFetchError>;
}

#[derive(Clone)]
pub struct OpenWeatherClient {
    http: Client,
    base_url: Url,
    api_key: String,
    lang: String,
}

impl fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("base_url", &self.base_url)
            .field("lang", &self.lang)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherClient {
    pub fn new(
        api_key: String,
        base_url: &str,
        lang: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherFetchError> {
        let http = Client::builder()
            .user_agent("tg-digestbot/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)
                .map_err(|e| WeatherFetchError::InvalidUrl(e.to_string()))?,
            api_key,
            lang: lang.to_string(),
        })
    }
}

#[async_trait]
impl WeatherService for OpenWeatherClient {
    #[instrument(skip(self))]
    async fn current(&self, city: &str) -> Result<WeatherSummary, WeatherFetchError> {
        let url = self
            .base_url
            .join("data/2.5/weather")
            .map_err(|e| WeatherFetchError::InvalidUrl(e.to_string()))?;
        let res = self
            .http
            .get(url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
                ("lang", self.lang.as_str()),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(WeatherFetchError::Status { status, body });
        }

        let body = res.text().await?;
        debug!(len = body.len(), "weather response received");
        parse_current(&body)
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResp {
    #[serde(default)]
    weather: Vec<Condition>,
    main: Option<MainBlock>,
    rain: Option<Precipitation>,
    snow: Option<Precipitation>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    feels_like: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Precipitation {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

/// Map an OpenWeatherMap `/weather` payload onto [`WeatherSummary`].
/// Rain wins over snow; a zero reading counts as no precipitation.
pub fn parse_current(body: &str) -> Result<WeatherSummary, WeatherFetchError> {
    let resp: CurrentResp =
        serde_json::from_str(body).map_err(|e| WeatherFetchError::Malformed(e.to_string()))?;
    let main = resp
        .main
        .ok_or_else(|| WeatherFetchError::Malformed("missing `main` block".into()))?;
    let description = resp
        .weather
        .into_iter()
        .next()
        .map(|c| c.description)
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| WeatherFetchError::Malformed("missing weather description".into()))?;
    let precipitation_mm = resp
        .rain
        .and_then(|p| p.one_hour)
        .or_else(|| resp.snow.and_then(|p| p.one_hour))
        .filter(|mm| *mm > 0.0);

    Ok(WeatherSummary {
        description,
        temp: main.temp,
        feels_like: main.feels_like.unwrap_or(main.temp),
        precipitation_mm,
    })
}
