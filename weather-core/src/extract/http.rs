use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{config::ApiConfig, error::ExtractError, model::RawObservation};

use super::WeatherSource;

/// [`WeatherSource`] backed by the weather HTTP API.
#[derive(Debug, Clone)]
pub struct HttpWeatherSource {
    base_url: Url,
    http: Client,
}

impl HttpWeatherSource {
    pub fn new(base_url: &str) -> Result<Self, ExtractError> {
        Self::build(base_url, Client::builder())
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self, ExtractError> {
        let mut builder = Client::builder();
        if let Some(secs) = api.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self::build(&api.base_url, builder)
    }

    fn build(base_url: &str, builder: reqwest::ClientBuilder) -> Result<Self, ExtractError> {
        let invalid = |reason: String| ExtractError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };

        let url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_string()));
        }

        let http = builder.build().map_err(ExtractError::Client)?;
        Ok(Self {
            base_url: url,
            http,
        })
    }

    /// `{base_url}/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<T, ExtractError> {
        let url_str = url.to_string();

        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ExtractError::Network {
                url: url_str.clone(),
                source,
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|source| ExtractError::Network {
            url: url_str.clone(),
            source,
        })?;

        if status != reqwest::StatusCode::OK {
            return Err(ExtractError::Status {
                url: url_str,
                status,
                body: truncate_body(&body),
            });
        }

        let parsed: Envelope<T> =
            serde_json::from_str(&body).map_err(|source| ExtractError::Malformed {
                url: url_str.clone(),
                source,
            })?;

        parsed
            .data
            .ok_or(ExtractError::MissingData { url: url_str })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CurrentData {
    location: Option<String>,
    timestamp: Option<String>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    condition: Option<String>,
    wind_speed: Option<f64>,
}

impl From<CurrentData> for RawObservation {
    fn from(d: CurrentData) -> Self {
        Self {
            city: d.location,
            timestamp: d.timestamp,
            temperature: d.temperature,
            humidity: d.humidity,
            condition: d.condition,
            wind_speed: d.wind_speed,
        }
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherSource {
    async fn locations(&self) -> Result<Vec<String>, ExtractError> {
        self.get_data(self.endpoint(&["weather", "locations"])).await
    }

    async fn current(&self, city: &str) -> Result<RawObservation, ExtractError> {
        let data: CurrentData = self
            .get_data(self.endpoint(&["weather", "current", city]))
            .await?;
        Ok(data.into())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CitySource, fetch_observations, resolve_cities};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_current(server: &MockServer, city_path: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(city_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn current_body(city: &str) -> serde_json::Value {
        json!({
            "data": {
                "location": city,
                "timestamp": "2024-01-01T00:00:00",
                "temperature": 15,
                "humidity": 60.5,
                "condition": "Clear",
                "wind_speed": 10
            }
        })
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = HttpWeatherSource::new("not a url").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn endpoint_encodes_city_and_handles_trailing_slash() {
        let src = HttpWeatherSource::new("http://localhost:5000/").unwrap();
        assert_eq!(
            src.endpoint(&["weather", "current", "New York"]).as_str(),
            "http://localhost:5000/weather/current/New%20York"
        );

        let src = HttpWeatherSource::new("http://localhost:5000/api").unwrap();
        assert_eq!(
            src.endpoint(&["weather", "locations"]).as_str(),
            "http://localhost:5000/api/weather/locations"
        );
    }

    #[test]
    fn truncates_long_bodies_on_char_boundary() {
        let long = "é".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn locations_are_read_from_data_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/locations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": ["Paris", "Oslo"] })),
            )
            .mount(&server)
            .await;

        let src = HttpWeatherSource::new(&server.uri()).unwrap();
        let (cities, from) = resolve_cities(&src).await;

        assert_eq!(cities, vec!["Paris", "Oslo"]);
        assert_eq!(from, CitySource::Api);
    }

    #[tokio::test]
    async fn locations_error_status_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/locations"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let src = HttpWeatherSource::new(&server.uri()).unwrap();
        let err = src.locations().await.unwrap_err();
        assert!(matches!(err, ExtractError::Status { status, .. } if status.as_u16() == 503));

        let (cities, from) = resolve_cities(&src).await;
        assert_eq!(cities, crate::extract::fallback_cities());
        assert_eq!(from, CitySource::Fallback);
    }

    #[tokio::test]
    async fn locations_without_data_field_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/locations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cities": ["X"] })))
            .mount(&server)
            .await;

        let src = HttpWeatherSource::new(&server.uri()).unwrap();
        assert!(matches!(
            src.locations().await.unwrap_err(),
            ExtractError::MissingData { .. }
        ));
        let (_, from) = resolve_cities(&src).await;
        assert_eq!(from, CitySource::Fallback);
    }

    #[tokio::test]
    async fn unreachable_server_falls_back() {
        // Nothing listens on the discard port.
        let src = HttpWeatherSource::new("http://127.0.0.1:9").unwrap();
        let (cities, from) = resolve_cities(&src).await;
        assert_eq!(cities.len(), 5);
        assert_eq!(from, CitySource::Fallback);
    }

    #[tokio::test]
    async fn current_maps_fields_onto_raw_observation() {
        let server = MockServer::start().await;
        mount_current(&server, "/weather/current/Paris", current_body("Paris")).await;

        let src = HttpWeatherSource::new(&server.uri()).unwrap();
        let obs = src.current("Paris").await.unwrap();

        assert_eq!(
            obs,
            RawObservation {
                city: Some("Paris".into()),
                timestamp: Some("2024-01-01T00:00:00".into()),
                temperature: Some(15.0),
                humidity: Some(60.5),
                condition: Some("Clear".into()),
                wind_speed: Some(10.0),
            }
        );
    }

    #[tokio::test]
    async fn current_with_missing_keys_keeps_gaps() {
        let server = MockServer::start().await;
        mount_current(
            &server,
            "/weather/current/Lima",
            json!({ "data": { "location": "Lima", "temperature": null } }),
        )
        .await;

        let src = HttpWeatherSource::new(&server.uri()).unwrap();
        let obs = src.current("Lima").await.unwrap();
        assert_eq!(obs.city.as_deref(), Some("Lima"));
        assert_eq!(obs.temperature, None);
        assert_eq!(obs.humidity, None);
    }

    #[tokio::test]
    async fn fetch_keeps_request_order_and_isolates_failures() {
        let server = MockServer::start().await;
        mount_current(&server, "/weather/current/New%20York", current_body("New York")).await;
        mount_current(&server, "/weather/current/Tokyo", current_body("Tokyo")).await;
        Mock::given(method("GET"))
            .and(path("/weather/current/London"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather/current/Sydney"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let src = HttpWeatherSource::new(&server.uri()).unwrap();
        let cities: Vec<String> = ["Tokyo", "London", "Sydney", "New York"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let out = fetch_observations(&src, &cities).await;

        let fetched: Vec<_> = out
            .observations
            .iter()
            .map(|o| o.city.clone().unwrap())
            .collect();
        assert_eq!(fetched, vec!["Tokyo", "New York"]);

        assert_eq!(out.failures.len(), 2);
        assert_eq!(out.failures[0].city, "London");
        assert!(matches!(out.failures[0].error, ExtractError::Status { .. }));
        assert_eq!(out.failures[1].city, "Sydney");
        assert!(matches!(out.failures[1].error, ExtractError::Malformed { .. }));
    }

    #[tokio::test]
    async fn configured_timeout_turns_slow_responses_into_network_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather/current/Paris"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(current_body("Paris"))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let api = ApiConfig {
            base_url: server.uri(),
            timeout_secs: Some(1),
            ..Default::default()
        };
        let src = HttpWeatherSource::from_config(&api).unwrap();

        let err = src.current("Paris").await.unwrap_err();
        let ExtractError::Network { source, .. } = &err else {
            panic!("expected a network error, got {err:?}");
        };
        assert!(source.is_timeout());
    }
}
