use async_trait::async_trait;

use crate::{
    error::LoadError,
    model::{City, ValidatedObservation, WeatherRecord},
};

use super::{LoadSummary, WeatherStore, distinct_cities};

/// Store that keeps both tables in memory.
///
/// Ids are assigned serially from 1, city names are unique, and fact rows
/// are appended without any natural key, the same as the SQL schema.
/// Writes cannot fail here, so a load is never left half applied.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    schema_ready: bool,
    cities: Vec<City>,
    records: Vec<WeatherRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_ready(&self) -> bool {
        self.schema_ready
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn city_id(&self, name: &str) -> Option<i32> {
        self.cities.iter().find(|c| c.name == name).map(|c| c.id)
    }

    fn next_city_id(&self) -> i32 {
        self.cities.last().map_or(1, |c| c.id + 1)
    }

    fn next_record_id(&self) -> i32 {
        self.records.last().map_or(1, |r| r.id + 1)
    }
}

#[async_trait]
impl WeatherStore for MemoryStore {
    async fn ensure_schema(&mut self) -> Result<(), LoadError> {
        self.schema_ready = true;
        Ok(())
    }

    async fn upsert_cities(&mut self, names: &[String]) -> Result<u64, LoadError> {
        let mut inserted = 0;
        for name in names {
            if self.city_id(name).is_none() {
                let id = self.next_city_id();
                self.cities.push(City {
                    id,
                    name: name.clone(),
                });
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_records(&mut self, batch: &[ValidatedObservation]) -> Result<u64, LoadError> {
        for obs in batch {
            let record = WeatherRecord {
                id: self.next_record_id(),
                city_id: self.city_id(&obs.city),
                timestamp: obs.timestamp,
                temperature: obs.temperature,
                humidity: obs.humidity,
                wind_speed: obs.wind_speed,
                condition: obs.condition.clone(),
            };
            self.records.push(record);
        }
        Ok(batch.len() as u64)
    }

    async fn load(&mut self, batch: &[ValidatedObservation]) -> Result<LoadSummary, LoadError> {
        let cities_inserted = self.upsert_cities(&distinct_cities(batch)).await?;
        let records_inserted = self.insert_records(batch).await?;

        Ok(LoadSummary {
            cities_inserted,
            records_inserted,
        })
    }
}
