//! Training pipeline for the AQI model

use std::path::Path;

use crate::config::TrainingConfig;
use crate::dataset::{self, Observation};
use crate::traits::Clock;

use super::features::split_features;
use super::model::{ModelBuilder, TrainingError};
use super::persistence::PersistedModel;

/// Fit a model on cleaned records, holding out `config.test_size` for evaluation
pub fn train_model<C: Clock + ?Sized>(
    records: &[Observation],
    config: &TrainingConfig,
    clock: &C,
) -> Result<PersistedModel, TrainingError> {
    if records.len() < config.min_samples.max(1) {
        return Err(TrainingError::InsufficientData(records.len()));
    }

    let (features, targets) = split_features(records);

    let builder = ModelBuilder::with_params(config.forest_params());
    let model = builder.train_with_holdout(&features, &targets, config.test_size)?;

    Ok(PersistedModel::new(model, clock.now_utc()))
}

/// Train from a cleaned CSV and save the artifact to `model_path`
///
/// Nothing is written when the dataset is missing, empty or too small.
pub fn train_from_path<C: Clock + ?Sized>(
    input: &Path,
    model_path: &Path,
    config: &TrainingConfig,
    clock: &C,
) -> Result<PersistedModel, TrainingError> {
    tracing::info!(input = %input.display(), "Starting model training");

    let records = dataset::load_observations(input)?;
    tracing::debug!(records = records.len(), "Loaded training data");

    let persisted = train_model(&records, config, clock)?;

    if let Some(rmse) = persisted.model.test_rmse {
        tracing::info!(
            "Root Mean Squared Error on the test set: {:.2} ({} samples)",
            rmse,
            persisted.model.test_samples
        );
    }

    persisted.save(model_path)?;
    tracing::info!(model = %model_path.display(), "{}", persisted.summary());

    Ok(persisted)
}
