use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, info, warn};

use crate::{error::ExtractError, model::RawObservation};

pub mod http;

pub use http::HttpWeatherSource;

/// Cities used when the locations endpoint cannot be read.
pub const FALLBACK_CITIES: [&str; 5] = ["New York", "London", "Tokyo", "Sydney", "Mumbai"];

/// Upstream that lists cities and serves current weather for each of them.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn locations(&self) -> Result<Vec<String>, ExtractError>;

    async fn current(&self, city: &str) -> Result<RawObservation, ExtractError>;
}

/// Where a city list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitySource {
    Api,
    Configured,
    Fallback,
}

pub fn fallback_cities() -> Vec<String> {
    FALLBACK_CITIES.iter().map(|c| c.to_string()).collect()
}

/// Ask the source for its city list without applying any fallback.
pub async fn try_resolve_cities(source: &dyn WeatherSource) -> Result<Vec<String>, ExtractError> {
    source.locations().await
}

/// City list from the source, or [`FALLBACK_CITIES`] on any failure.
pub async fn resolve_cities(source: &dyn WeatherSource) -> (Vec<String>, CitySource) {
    match try_resolve_cities(source).await {
        Ok(cities) => {
            info!(count = cities.len(), "Resolved cities from locations endpoint");
            (cities, CitySource::Api)
        }
        Err(err) => {
            warn!(error = %err, "Locations endpoint unavailable, using fallback cities");
            (fallback_cities(), CitySource::Fallback)
        }
    }
}

/// A city whose observation could not be fetched.
#[derive(Debug)]
pub struct CityFailure {
    pub city: String,
    pub error: ExtractError,
}

/// Result of one extraction pass. Observations keep request order.
#[derive(Debug, Default)]
pub struct Extraction {
    pub observations: Vec<RawObservation>,
    pub failures: Vec<CityFailure>,
}

/// Fetch current weather for every city, one request each.
///
/// A failure for one city is recorded and the scan moves on.
pub async fn fetch_observations(source: &dyn WeatherSource, cities: &[String]) -> Extraction {
    let mut out = Extraction::default();

    for city in cities {
        match source.current(city).await {
            Ok(obs) => {
                debug!(city = %city, ?obs, "Fetched observation");
                out.observations.push(obs);
            }
            Err(error) => {
                match &error {
                    ExtractError::Status { status, .. } => {
                        warn!(city = %city, %status, "Failed to fetch data");
                    }
                    other => warn!(city = %city, error = %other, "Skipping city"),
                }
                out.failures.push(CityFailure {
                    city: city.clone(),
                    error,
                });
            }
        }
    }

    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory source for pipeline tests.
    #[derive(Debug, Default)]
    pub struct StubSource {
        pub locations: Option<Vec<String>>,
        pub observations: HashMap<String, RawObservation>,
    }

    impl StubSource {
        pub fn with_city(mut self, city: &str, temperature: f64) -> Self {
            self.observations.insert(
                city.to_string(),
                RawObservation {
                    city: Some(city.to_string()),
                    timestamp: Some("2024-01-01T00:00:00".to_string()),
                    temperature: Some(temperature),
                    humidity: Some(60.0),
                    condition: Some("Clear".to_string()),
                    wind_speed: Some(10.0),
                },
            );
            self
        }
    }

    #[async_trait]
    impl WeatherSource for StubSource {
        async fn locations(&self) -> Result<Vec<String>, ExtractError> {
            self.locations.clone().ok_or_else(|| ExtractError::MissingData {
                url: "stub://weather/locations".to_string(),
            })
        }

        async fn current(&self, city: &str) -> Result<RawObservation, ExtractError> {
            self.observations
                .get(city)
                .cloned()
                .ok_or_else(|| ExtractError::Status {
                    url: format!("stub://weather/current/{city}"),
                    status: reqwest::StatusCode::NOT_FOUND,
                    body: String::new(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubSource;
    use super::*;

    #[tokio::test]
    async fn resolve_uses_api_list_when_available() {
        let source = StubSource {
            locations: Some(vec!["Paris".into(), "Oslo".into()]),
            ..Default::default()
        };
        let (cities, from) = resolve_cities(&source).await;
        assert_eq!(cities, vec!["Paris", "Oslo"]);
        assert_eq!(from, CitySource::Api);
    }

    #[tokio::test]
    async fn resolve_falls_back_on_error() {
        let source = StubSource::default();
        let (cities, from) = resolve_cities(&source).await;
        assert_eq!(cities, vec!["New York", "London", "Tokyo", "Sydney", "Mumbai"]);
        assert_eq!(from, CitySource::Fallback);
        assert!(try_resolve_cities(&source).await.is_err());
    }

    #[tokio::test]
    async fn one_failing_city_does_not_stop_the_rest() {
        let source = StubSource::default()
            .with_city("Paris", 15.0)
            .with_city("Tokyo", 20.0);
        let cities: Vec<String> = ["Paris", "Atlantis", "Tokyo"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let out = fetch_observations(&source, &cities).await;

        let fetched: Vec<_> = out
            .observations
            .iter()
            .map(|o| o.city.as_deref().unwrap())
            .collect();
        assert_eq!(fetched, vec!["Paris", "Tokyo"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].city, "Atlantis");
    }
}
