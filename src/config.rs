use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::ml::{FeatureVector, ForestParams};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub training: TrainingConfig,
    pub dashboard: DashboardConfig,
}

/// Locations of the pipeline artifacts.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PathsConfig {
    /// Raw city/day dataset read by the preprocessor
    pub raw_data: PathBuf,
    /// Cleaned dataset written by the preprocessor, read by training and the dashboard
    pub cleaned_data: PathBuf,
    /// Model artifact written by training, read by the dashboard
    pub model: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("city_day.csv"),
            cleaned_data: PathBuf::from("cleaned_city_day.csv"),
            model: PathBuf::from("aqi_predictor.bin"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TrainingConfig {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// Features tried at each split
    pub max_features: usize,
    /// Fraction of records held out for evaluation
    pub test_size: f64,
    /// Seed for the holdout split and the forest
    pub seed: u64,
    /// Smallest cleaned dataset that will be trained on
    pub min_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 15,
            min_samples_leaf: 5,
            min_samples_split: 2,
            max_features: FeatureVector::NUM_FEATURES,
            test_size: 0.2,
            seed: 42,
            min_samples: 10,
        }
    }
}

impl TrainingConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
            max_features: self.max_features,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Warn when the loaded model is older than this
    pub model_max_age_hours: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            model_max_age_hours: 24 * 30,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aqi-insight");

        let paths = PathsConfig::default();
        let training = TrainingConfig::default();
        let dashboard = DashboardConfig::default();

        let builder = Config::builder()
            // 1. Load default values
            // Paths
            .set_default("paths.raw_data", paths.raw_data.to_string_lossy().to_string())?
            .set_default("paths.cleaned_data", paths.cleaned_data.to_string_lossy().to_string())?
            .set_default("paths.model", paths.model.to_string_lossy().to_string())?
            // Training
            .set_default("training.n_trees", training.n_trees as u64)?
            .set_default("training.max_depth", training.max_depth as u64)?
            .set_default("training.min_samples_leaf", training.min_samples_leaf as u64)?
            .set_default("training.min_samples_split", training.min_samples_split as u64)?
            .set_default("training.max_features", training.max_features as u64)?
            .set_default("training.test_size", training.test_size)?
            .set_default("training.seed", training.seed)?
            .set_default("training.min_samples", training.min_samples as u64)?
            // Dashboard
            .set_default("dashboard.model_max_age_hours", dashboard.model_max_age_hours)?

            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Load from Environment variables (AQI__PATHS__MODEL=...)
            .add_source(Environment::with_prefix("AQI").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}
