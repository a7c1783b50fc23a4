//! # Weather - Current Conditions Capability
//!
//! Two-step lookup against Open-Meteo: geocode the city name, then fetch the
//! current weather for the resolved coordinates. No API key needed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{required_str, Capability, CapabilityError, CapabilityProvider};
use crate::state::ToolInput;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeoLocation>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeoLocation {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: i64,
    #[serde(default)]
    time: Option<String>,
}

/// Open-Meteo backed `weather` provider
pub struct WeatherProvider {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl Default for WeatherProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherProvider {
    pub fn new() -> Self {
        Self::with_endpoints(GEOCODING_URL, FORECAST_URL)
    }

    /// Point the provider at different (e.g. self-hosted) endpoints
    pub fn with_endpoints(geocoding_url: &str, forecast_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            geocoding_url: geocoding_url.to_string(),
            forecast_url: forecast_url.to_string(),
        }
    }

    async fn geocode(&self, city: &str) -> Result<GeoLocation, CapabilityError> {
        let response: GeocodingResponse = self
            .client
            .get(&self.geocoding_url)
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_error)?
            .json()
            .await
            .map_err(request_error)?;

        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::CityNotFound(city.to_string()))
    }

    async fn current(&self, location: &GeoLocation) -> Result<CurrentWeather, CapabilityError> {
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();
        let response: ForecastResponse = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current_weather", "true"),
                ("temperature_unit", "celsius"),
                ("windspeed_unit", "kmh"),
                ("timezone", "auto"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_error)?
            .json()
            .await
            .map_err(request_error)?;

        response.current_weather.ok_or_else(|| CapabilityError::Request {
            capability: Capability::Weather,
            reason: format!("no current weather returned for '{}'", location.name),
        })
    }
}

fn request_error(err: reqwest::Error) -> CapabilityError {
    CapabilityError::Request {
        capability: Capability::Weather,
        reason: err.to_string(),
    }
}

/// Human-readable description of a WMO weather interpretation code
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 => "Snow fall",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown conditions",
    }
}

fn weather_report(location: &GeoLocation, current: &CurrentWeather) -> Value {
    json!({
        "city": location.name,
        "country": location.country,
        "latitude": location.latitude,
        "longitude": location.longitude,
        "temperature_c": current.temperature,
        "windspeed_kmh": current.windspeed,
        "weather_code": current.weathercode,
        "description": describe_weather_code(current.weathercode),
        "observed_at": current.time
    })
}

#[async_trait]
impl CapabilityProvider for WeatherProvider {
    fn capability(&self) -> Capability {
        Capability::Weather
    }

    async fn invoke(&self, input: &ToolInput) -> Result<Value, CapabilityError> {
        let city = required_str(Capability::Weather, input)?;
        let location = self.geocode(city).await?;
        tracing::debug!(city, lat = location.latitude, lon = location.longitude, "Geocoded city");
        let current = self.current(&location).await?;
        Ok(weather_report(&location, &current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_codes() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(48), "Fog");
        assert_eq!(describe_weather_code(81), "Rain showers");
        assert_eq!(describe_weather_code(99), "Thunderstorm with hail");
        assert_eq!(describe_weather_code(-1), "Unknown conditions");
    }

    #[test]
    fn test_geocoding_response_without_results() {
        let parsed: GeocodingResponse = serde_json::from_str(r#"{"generationtime_ms": 0.5}"#).unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn test_report_shape() {
        let location = GeoLocation {
            name: "Hanoi".to_string(),
            latitude: 21.02,
            longitude: 105.84,
            country: Some("Vietnam".to_string()),
        };
        let forecast: ForecastResponse = serde_json::from_value(json!({
            "current_weather": {"temperature": 31.4, "windspeed": 9.2, "weathercode": 2, "time": "2024-06-01T14:00"}
        }))
        .unwrap();
        let report = weather_report(&location, forecast.current_weather.as_ref().unwrap());
        assert_eq!(report["city"], "Hanoi");
        assert_eq!(report["description"], "Partly cloudy");
        assert_eq!(report["temperature_c"], 31.4);
    }

    #[tokio::test]
    async fn test_missing_city_is_rejected_before_any_request() {
        let provider = WeatherProvider::with_endpoints("http://127.0.0.1:9/geo", "http://127.0.0.1:9/fc");
        let err = provider.invoke(&ToolInput::new()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidInput { key: "city", .. }));
    }
}
