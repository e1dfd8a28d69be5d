//! Machine Learning module for AQI prediction
//!
//! A random-forest regressor maps the twelve pollutant concentrations of a
//! cleaned observation to its AQI.

pub mod features;
pub mod model;
pub mod persistence;
pub mod training;

pub use features::{FeatureVector, split_features};
pub use model::{ForestParams, ModelBuilder, TrainedModel, TrainingError};
pub use persistence::{PersistedModel, PersistenceError};
pub use training::{train_from_path, train_model};
