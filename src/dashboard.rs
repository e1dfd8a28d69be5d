//! Read-only views over the cleaned dataset and the trained model.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::advisor::AqiCategory;
use crate::analytics::{self, DateRange, SeriesStats};
use crate::cache::ArtifactCache;
use crate::config::AppConfig;
use crate::dataset::{DatasetError, Observation, Pollutant};
use crate::ml::{FeatureVector, PersistenceError, TrainingError};
use crate::traits::{Clock, SystemClock};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no observations for city `{0}`")]
    UnknownCity(String),
    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
    #[error("{pollutant} must be a non-negative number, got {value}")]
    InvalidConcentration { pollutant: Pollutant, value: f64 },
    #[error("dataset unavailable: {0}")]
    Dataset(#[from] DatasetError),
    #[error("model unavailable: {0}")]
    Model(#[from] PersistenceError),
    #[error("prediction failed: {0}")]
    Prediction(#[from] TrainingError),
}

/// A city's records over a date range with their summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CityHistory {
    pub city: String,
    pub range: DateRange,
    pub records: Vec<Observation>,
    pub aqi: Option<SeriesStats>,
    pub pollutant: Pollutant,
    pub pollutant_stats: Option<SeriesStats>,
    pub buckets: Vec<(AqiCategory, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Model output truncated towards zero
    pub aqi: i64,
    /// Raw model output
    pub estimate: f64,
    pub category: AqiCategory,
}

pub struct Dashboard {
    cache: ArtifactCache,
    model_max_age_hours: i64,
    clock: Arc<dyn Clock>,
}

impl Dashboard {
    pub fn new(cache: ArtifactCache, model_max_age_hours: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            model_max_age_hours,
            clock,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ArtifactCache::from_config(&config.paths),
            config.dashboard.model_max_age_hours,
            Arc::new(SystemClock),
        )
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Drop cached artifacts so the next view reads them from disk again.
    pub fn reload(&mut self) {
        self.cache.invalidate_all();
        tracing::info!("Dashboard artifacts invalidated");
    }

    /// Cities present in the cleaned dataset, sorted.
    pub fn cities(&mut self) -> Result<Vec<String>, DashboardError> {
        Ok(analytics::cities(self.cache.dataset()?))
    }

    /// History of `city` between `from` and `to`, inclusive.
    ///
    /// Missing bounds default to the city's first and last recorded day.
    pub fn history(
        &mut self,
        city: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        pollutant: Pollutant,
    ) -> Result<CityHistory, DashboardError> {
        let records = self.cache.dataset()?;

        let bounds = analytics::date_bounds(records.iter().filter(|obs| obs.city == city))
            .ok_or_else(|| DashboardError::UnknownCity(city.to_string()))?;
        let from = from.unwrap_or(bounds.start);
        let to = to.unwrap_or(bounds.end);
        let range = DateRange::new(from, to).ok_or(DashboardError::InvalidRange { from, to })?;

        let selected = analytics::filter_city_range(records, city, range);
        tracing::debug!(city, rows = selected.len(), "Selected {} days", range.days());

        Ok(CityHistory {
            city: city.to_string(),
            range,
            aqi: analytics::aqi_stats(&selected),
            pollutant,
            pollutant_stats: analytics::pollutant_stats(&selected, pollutant),
            buckets: analytics::bucket_counts(&selected),
            records: selected.into_iter().cloned().collect(),
        })
    }

    /// Predict AQI for a set of concentrations.
    pub fn predict(&mut self, features: &FeatureVector) -> Result<Prediction, DashboardError> {
        for pollutant in Pollutant::ALL {
            let value = features.get(pollutant);
            if !(value >= 0.0 && value.is_finite()) {
                return Err(DashboardError::InvalidConcentration { pollutant, value });
            }
        }

        let model = self.cache.model()?;
        if model.is_stale(self.model_max_age_hours, self.clock.as_ref()) {
            tracing::warn!(
                "Model trained {} is older than {} hours; consider retraining",
                model.created_at.format("%Y-%m-%d %H:%M UTC"),
                self.model_max_age_hours
            );
        }

        let estimate = model.predict(features)?;
        let aqi = estimate.trunc() as i64;

        Ok(Prediction {
            aqi,
            estimate,
            category: AqiCategory::from_aqi(aqi as f64),
        })
    }
}
