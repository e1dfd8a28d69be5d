//! AQI Insight Library
//!
//! Cleans city/day air-quality records, trains a random-forest AQI predictor
//! on them, and serves read-only dashboard views over both artifacts.

pub mod advisor;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod ml;
pub mod preprocess;
pub mod traits;

// Re-export commonly used types
pub use advisor::AqiCategory;
pub use analytics::{
    DateRange, SeriesStats, aqi_stats, bucket_counts, calculate_stats, cities, date_bounds,
    filter_city_range, pollutant_stats,
};
pub use cache::ArtifactCache;
pub use config::AppConfig;
pub use dashboard::{CityHistory, Dashboard, DashboardError, Prediction};
pub use dataset::{
    DatasetError, Observation, Pollutant, RawObservation, load_observations, load_raw,
    write_observations,
};
pub use ml::{
    FeatureVector, ModelBuilder, PersistedModel, PersistenceError, TrainedModel, TrainingError,
    train_from_path, train_model,
};
pub use preprocess::{PreprocessSummary, clean, run_preprocess};
pub use traits::{Clock, MockClock, SystemClock};
