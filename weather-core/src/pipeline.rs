//! One extract, transform, load pass.

use tracing::{debug, error, info, warn};

use crate::{
    error::{LoadError, TransformError},
    extract::{self, CityFailure, CitySource, WeatherSource},
    store::{LoadSummary, WeatherStore},
    transform::{self, TransformReport, ValidationRules},
};

/// What a run did, stage by stage.
#[derive(Debug)]
pub struct RunReport {
    pub cities: Vec<String>,
    pub city_source: CitySource,
    pub extracted: usize,
    pub failures: Vec<CityFailure>,
    pub transform: TransformReport,
    /// Set when the whole batch was rejected before row validation.
    pub rejected: Option<TransformError>,
    pub load: LoadSummary,
}

impl RunReport {
    pub fn processed(&self) -> u64 {
        self.load.records_inserted
    }
}

pub struct Pipeline<'a> {
    source: &'a dyn WeatherSource,
    store: &'a mut dyn WeatherStore,
    rules: ValidationRules,
    cities: Vec<String>,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn WeatherSource, store: &'a mut dyn WeatherStore) -> Self {
        Self {
            source,
            store,
            rules: ValidationRules::default(),
            cities: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Use these cities instead of asking the locations endpoint. Empty means ask.
    pub fn with_cities(mut self, cities: Vec<String>) -> Self {
        self.cities = cities;
        self
    }

    /// Extraction and transform problems degrade to smaller batches; only
    /// store failures end the run.
    pub async fn run(self) -> Result<RunReport, LoadError> {
        let (cities, city_source) = if self.cities.is_empty() {
            extract::resolve_cities(self.source).await
        } else {
            (self.cities, CitySource::Configured)
        };

        let extraction = extract::fetch_observations(self.source, &cities).await;
        info!("Extracted {} records", extraction.observations.len());
        if let Some(sample) = extraction.observations.first() {
            debug!(?sample, "Sample record");
        }
        if !extraction.failures.is_empty() {
            warn!(
                failed = extraction.failures.len(),
                requested = cities.len(),
                "Some cities could not be fetched"
            );
        }

        let (rows, report, rejected) =
            match transform::transform(&extraction.observations, &self.rules) {
                Ok(t) => (t.rows, t.report, None),
                Err(err) => {
                    error!(error = %err, "Rejecting extracted batch");
                    let report = TransformReport {
                        input: extraction.observations.len(),
                        dropped_rejected: extraction.observations.len(),
                        ..Default::default()
                    };
                    (Vec::new(), report, Some(err))
                }
            };
        if report.dropped() > 0 {
            info!(
                incomplete = report.dropped_incomplete,
                out_of_range = report.dropped_out_of_range,
                bad_timestamp = report.dropped_bad_timestamp,
                rejected = report.dropped_rejected,
                "Dropped invalid rows"
            );
        }

        self.store.ensure_schema().await?;
        let load = self.store.load(&rows).await?;

        info!("Processed {} weather records", load.records_inserted);

        Ok(RunReport {
            cities,
            city_source,
            extracted: extraction.observations.len(),
            failures: extraction.failures,
            transform: report,
            rejected,
            load,
        })
    }
}
