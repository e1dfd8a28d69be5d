//! Model persistence - save and load trained models

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::features::FeatureVector;
use super::model::{TrainedModel, TrainingError};
use crate::traits::Clock;

/// Serialized model artifact: the fitted forest plus its metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedModel {
    /// Version for backward compatibility
    pub version: u32,
    /// When the model was trained
    pub created_at: DateTime<Utc>,
    /// Input columns, in the order `predict` expects them
    pub feature_names: Vec<String>,
    /// The fitted model
    pub model: TrainedModel,
}

impl PersistedModel {
    /// Current version number
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(model: TrainedModel, created_at: DateTime<Utc>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            created_at,
            feature_names: FeatureVector::feature_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            model,
        }
    }

    /// Predict AQI for one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, TrainingError> {
        self.model.predict(features)
    }

    /// Save to a file using bincode
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::IoError(e.to_string()))?;
        }

        let bytes =
            bincode::serialize(self).map_err(|e| PersistenceError::SerializeError(e.to_string()))?;

        // Replace the artifact only once the new one is fully on disk
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, bytes)
            .and_then(|()| fs::rename(&tmp_path, path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                PersistenceError::IoError(e.to_string())
            })
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PersistenceError::FileNotFound(path.to_string_lossy().to_string())
            }
            _ => PersistenceError::IoError(e.to_string()),
        })?;

        let model: Self = bincode::deserialize(&bytes)
            .map_err(|e| PersistenceError::DeserializeError(e.to_string()))?;

        // Version check
        if model.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: model.version,
            });
        }

        if model.feature_names != FeatureVector::feature_names() {
            return Err(PersistenceError::FeatureMismatch(model.feature_names.join(", ")));
        }

        Ok(model)
    }

    /// Check if the persisted model is older than `max_age_hours`
    pub fn is_stale<C: Clock + ?Sized>(&self, max_age_hours: i64, clock: &C) -> bool {
        let age = clock.now_utc() - self.created_at;
        age.num_hours() > max_age_hours
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Model v{}: {} trees, {} samples, train_rmse={:.2}, test_rmse={}, created {}",
            self.version,
            self.model.params.n_trees,
            self.model.training_samples,
            self.model.training_rmse,
            self.model
                .test_rmse
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "N/A".to_string()),
            self.created_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// Errors that can occur during model persistence
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Model file not found: {0}")]
    FileNotFound(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializeError(String),
    #[error("Deserialization error: {0}")]
    DeserializeError(String),
    #[error("Model version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Model expects features [{0}]")]
    FeatureMismatch(String),
}
