//! Core library for the `weather-etl` job.
//!
//! This crate defines:
//! - Configuration (API location, database credentials, validation ranges)
//! - The extract stage over a [`WeatherSource`]
//! - The transform stage that validates raw observations
//! - The load stage over a [`WeatherStore`] (PostgreSQL or in-memory)
//! - A [`Pipeline`] that runs the three stages in order
//!
//! It is used by `weather-cli`, but can also be driven from other binaries or tests.

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod transform;

pub use config::{ApiConfig, Config, DatabaseConfig};
pub use error::{ExtractError, LoadError, TransformError};
pub use extract::{HttpWeatherSource, WeatherSource};
pub use model::{City, RawObservation, ValidatedObservation, WeatherRecord};
pub use pipeline::{Pipeline, RunReport};
pub use store::{LoadSummary, MemoryStore, PgStore, WeatherStore};
pub use transform::{Bounds, ValidationRules};
