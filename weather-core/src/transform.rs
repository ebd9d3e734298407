//! Validation and cleaning of raw observations.
//!
//! The stage is pure: it never touches the network or the database, and the
//! only batch-level failure is a required column missing from every row.

use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::TransformError,
    model::{RawObservation, ValidatedObservation},
};

/// Columns the batch-level guard checks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Temperature,
    Humidity,
    WindSpeed,
    Timestamp,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Temperature => "temperature",
            Column::Humidity => "humidity",
            Column::WindSpeed => "wind_speed",
            Column::Timestamp => "timestamp",
        }
    }

    pub const fn required() -> &'static [Column] {
        &[
            Column::Temperature,
            Column::Humidity,
            Column::WindSpeed,
            Column::Timestamp,
        ]
    }

    fn is_present(&self, row: &RawObservation) -> bool {
        match self {
            Column::Temperature => row.temperature.is_some(),
            Column::Humidity => row.humidity.is_some(),
            Column::WindSpeed => row.wind_speed.is_some(),
            Column::Timestamp => row.timestamp.is_some(),
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Accepted ranges for the numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub temperature: Bounds,
    pub humidity: Bounds,
    pub wind_speed: Bounds,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            temperature: Bounds::new(-20.0, 45.0),
            humidity: Bounds::new(0.0, 100.0),
            wind_speed: Bounds::new(0.0, 100.0),
        }
    }
}

impl ValidationRules {
    pub fn check(&self) -> anyhow::Result<()> {
        for (name, b) in [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("wind_speed", self.wind_speed),
        ] {
            if b.min.is_nan() || b.max.is_nan() || b.min > b.max {
                bail!("validation.{name}: min ({}) must not exceed max ({})", b.min, b.max);
            }
        }
        Ok(())
    }

    fn accepts(&self, temperature: f64, humidity: f64, wind_speed: f64) -> bool {
        self.temperature.contains(temperature)
            && self.humidity.contains(humidity)
            && self.wind_speed.contains(wind_speed)
    }
}

/// Per-row outcome counts for one transform call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub input: usize,
    pub kept: usize,
    pub dropped_incomplete: usize,
    pub dropped_out_of_range: usize,
    pub dropped_bad_timestamp: usize,
    /// Rows discarded because the whole batch failed the column guard.
    pub dropped_rejected: usize,
}

impl TransformReport {
    pub fn dropped(&self) -> usize {
        self.dropped_incomplete
            + self.dropped_out_of_range
            + self.dropped_bad_timestamp
            + self.dropped_rejected
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformed {
    pub rows: Vec<ValidatedObservation>,
    pub report: TransformReport,
}

/// Validate a raw batch.
///
/// Rows keep their input order. A row is dropped if any field is absent, a
/// numeric field is out of range, or its timestamp cannot be parsed.
pub fn transform(
    raw: &[RawObservation],
    rules: &ValidationRules,
) -> Result<Transformed, TransformError> {
    if raw.is_empty() {
        debug!("No weather data to transform");
        return Ok(Transformed::default());
    }

    let missing: Vec<Column> = Column::required()
        .iter()
        .copied()
        .filter(|col| !raw.iter().any(|row| col.is_present(row)))
        .collect();
    if !missing.is_empty() {
        return Err(TransformError::MissingColumns(missing));
    }

    let mut report = TransformReport {
        input: raw.len(),
        ..Default::default()
    };
    let mut rows = Vec::with_capacity(raw.len());

    for row in raw {
        let (
            Some(city),
            Some(timestamp),
            Some(temperature),
            Some(humidity),
            Some(condition),
            Some(wind_speed),
        ) = (
            &row.city,
            &row.timestamp,
            row.temperature,
            row.humidity,
            &row.condition,
            row.wind_speed,
        )
        else {
            report.dropped_incomplete += 1;
            continue;
        };

        if !rules.accepts(temperature, humidity, wind_speed) {
            report.dropped_out_of_range += 1;
            continue;
        }

        let Some(timestamp) = parse_timestamp(timestamp) else {
            warn!(city = %city, timestamp = %timestamp, "Dropping row with unparseable timestamp");
            report.dropped_bad_timestamp += 1;
            continue;
        };

        rows.push(ValidatedObservation {
            city: city.clone(),
            timestamp,
            temperature,
            humidity,
            condition: condition.clone(),
            wind_speed,
        });
    }

    report.kept = rows.len();
    debug!(?report, "Transform finished");

    Ok(Transformed { rows, report })
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601-ish timestamp. Values carrying an offset are converted to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
