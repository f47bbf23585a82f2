//! Weather lookup against the OpenWeather current-conditions API
//!
//! Every outcome is a sentence: the result is spliced into a prompt, so
//! failures degrade to an explanation the model can relay instead of an error.

use crate::config::WeatherConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Returned when no API key is configured
pub const MISSING_KEY_MESSAGE: &str =
    "Weather API key not configured. Please set OPENWEATHER_KEY environment variable.";

/// Source of short weather summaries
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Summarize current conditions for `city`; never fails
    async fn fetch_weather(&self, city: &str) -> String;
}

pub struct OpenWeatherClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    units: String,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.clone(),
            units: config.units.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    async fn request(&self, city: &str, api_key: &str) -> Result<Value, reqwest::Error> {
        self.client
            .get(&self.base_url)
            .query(&[("q", city), ("appid", api_key), ("units", &self.units)])
            .timeout(self.timeout)
            .send()
            .await?
            .json::<Value>()
            .await
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_weather(&self, city: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("Weather lookup for {} skipped: no API key", city);
            return MISSING_KEY_MESSAGE.to_string();
        };

        match self.request(city, api_key).await {
            Ok(body) => summarize(city, &body, &self.units),
            Err(e) => {
                tracing::warn!("Weather API error for {}: {}", city, e);
                unavailable_later(city)
            }
        }
    }
}

fn unavailable_later(city: &str) -> String {
    format!(
        "Unable to fetch weather data for {}. Please try again later.",
        city
    )
}

/// Build the summary sentence from an OpenWeather payload.
///
/// `cod` is a number on success and often a string on errors, so both are accepted.
pub fn summarize(city: &str, body: &Value, units: &str) -> String {
    let code = match body.get("cod") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };

    if code != Some(200) {
        let upstream = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("Unknown error");
        return format!(
            "Weather data not available for {}. Error: {}",
            city, upstream
        );
    }

    let description = body
        .pointer("/weather/0/description")
        .and_then(Value::as_str);
    let temp = body.pointer("/main/temp").and_then(Value::as_f64);
    let feels_like = body.pointer("/main/feels_like").and_then(Value::as_f64);
    let humidity = body.pointer("/main/humidity").and_then(Value::as_f64);
    let wind = body.pointer("/wind/speed").and_then(Value::as_f64);

    let (Some(description), Some(temp), Some(feels_like), Some(humidity), Some(wind)) =
        (description, temp, feels_like, humidity, wind)
    else {
        tracing::warn!("Weather payload for {} is missing fields", city);
        return unavailable_later(city);
    };

    let (degree, speed) = match units {
        "imperial" => ("°F", "mph"),
        "standard" => ("K", "m/s"),
        _ => ("°C", "m/s"),
    };

    format!(
        "Current weather in {}: {}, {}{} (feels like {}{}), humidity {}%, wind speed {} {}",
        city, description, temp, degree, feels_like, degree, humidity, wind, speed
    )
}
