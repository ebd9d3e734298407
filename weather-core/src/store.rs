use async_trait::async_trait;
use std::{collections::HashSet, fmt::Debug};

use crate::{error::LoadError, model::ValidatedObservation};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Counts written by one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub cities_inserted: u64,
    pub records_inserted: u64,
}

/// Destination for validated observations: a `cities` dimension and a
/// `weather_data` fact table.
#[async_trait]
pub trait WeatherStore: Send + Debug {
    /// Create both tables if they do not exist yet.
    async fn ensure_schema(&mut self) -> Result<(), LoadError>;

    /// Insert each name that is not already present. Returns the number of new rows.
    async fn upsert_cities(&mut self, names: &[String]) -> Result<u64, LoadError>;

    /// Insert one fact row per observation, resolving the city id by name.
    async fn insert_records(&mut self, batch: &[ValidatedObservation]) -> Result<u64, LoadError>;

    /// Upsert the batch's cities and insert its facts as a single unit.
    async fn load(&mut self, batch: &[ValidatedObservation]) -> Result<LoadSummary, LoadError>;
}

/// City names in order of first appearance, without repeats.
pub fn distinct_cities(batch: &[ValidatedObservation]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for obs in batch {
        if seen.insert(obs.city.as_str()) {
            names.push(obs.city.clone());
        }
    }
    names
}

#[cfg(test)]
pub(crate) fn observation(city: &str, hour: u32) -> ValidatedObservation {
    use chrono::NaiveDate;

    ValidatedObservation {
        city: city.to_string(),
        timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap(),
        temperature: 15.0,
        humidity: 60.0,
        condition: "Clear".to_string(),
        wind_speed: 10.0,
    }
}
