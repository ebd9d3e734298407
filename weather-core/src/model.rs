use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One current-weather document as returned by the API, before validation.
///
/// Every field is optional: the upstream payload is loosely typed and rows
/// with gaps are only discarded by the transform stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub city: Option<String>,
    pub timestamp: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub condition: Option<String>,
    pub wind_speed: Option<f64>,
}

/// An observation that passed every completeness and range check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedObservation {
    pub city: String,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub condition: String,
    pub wind_speed: f64,
}

impl From<&ValidatedObservation> for RawObservation {
    fn from(obs: &ValidatedObservation) -> Self {
        Self {
            city: Some(obs.city.clone()),
            timestamp: Some(obs.timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            temperature: Some(obs.temperature),
            humidity: Some(obs.humidity),
            condition: Some(obs.condition.clone()),
            wind_speed: Some(obs.wind_speed),
        }
    }
}

/// Row of the `cities` dimension table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: i32,
    pub name: String,
}

/// Row of the `weather_data` fact table.
///
/// `city_id` is resolved by name when the row is written and is `None` if no
/// city of that name existed at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub id: i32,
    pub city_id: Option<i32>,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub condition: String,
}
