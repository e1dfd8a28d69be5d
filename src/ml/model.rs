//! ML model wrapper for the random-forest AQI regressor

use std::fmt;

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::model_selection::train_test_split;
use thiserror::Error;

use super::features::FeatureVector;
use crate::dataset::DatasetError;
use crate::ml::persistence::PersistenceError;

/// Fitted forest as produced by smartcore
pub type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Hyper-parameters of the forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    /// Features tried at each split; all of them by default
    pub max_features: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 15,
            min_samples_leaf: 5,
            min_samples_split: 2,
            max_features: FeatureVector::NUM_FEATURES,
            seed: 42,
        }
    }
}

/// A trained ML model for AQI prediction
#[derive(Serialize, Deserialize)]
pub struct TrainedModel {
    forest: Forest,
    /// Parameters the forest was fitted with
    pub params: ForestParams,
    /// Number of samples used for fitting
    pub training_samples: usize,
    /// Number of held-out samples (0 when trained without a holdout)
    pub test_samples: usize,
    /// Root mean squared error on the training samples
    pub training_rmse: f64,
    /// Root mean squared error on the held-out samples
    pub test_rmse: Option<f64>,
}

impl fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainedModel")
            .field("params", &self.params)
            .field("training_samples", &self.training_samples)
            .field("test_samples", &self.test_samples)
            .field("training_rmse", &self.training_rmse)
            .field("test_rmse", &self.test_rmse)
            .finish_non_exhaustive()
    }
}

impl TrainedModel {
    /// Predict AQI for a single feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, TrainingError> {
        let predictions = self.predict_batch(std::slice::from_ref(features))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| TrainingError::PredictError("empty prediction".to_string()))
    }

    /// Predict AQI for multiple feature vectors
    pub fn predict_batch(&self, features: &[FeatureVector]) -> Result<Vec<f64>, TrainingError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let x = to_matrix(features);
        self.forest
            .predict(&x)
            .map_err(|e| TrainingError::PredictError(e.to_string()))
    }

    /// Get model information as a string
    pub fn info(&self) -> String {
        format!(
            "TrainedModel(trees={}, max_depth={}, samples={}, train_rmse={:.2}, test_rmse={})",
            self.params.n_trees,
            self.params.max_depth,
            self.training_samples,
            self.training_rmse,
            self.test_rmse
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "N/A".to_string()),
        )
    }
}

/// Builder for training a model
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    params: ForestParams,
}

impl ModelBuilder {
    /// Create a new model builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.params.n_trees = n_trees;
        self
    }

    pub fn max_depth(mut self, depth: u16) -> Self {
        self.params.max_depth = depth;
        self
    }

    pub fn min_samples_split(mut self, samples: usize) -> Self {
        self.params.min_samples_split = samples;
        self
    }

    pub fn min_samples_leaf(mut self, samples: usize) -> Self {
        self.params.min_samples_leaf = samples;
        self
    }

    pub fn max_features(mut self, features: usize) -> Self {
        self.params.max_features = features;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    fn forest_parameters(&self) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(self.params.n_trees as _)
            .with_max_depth(self.params.max_depth as _)
            .with_min_samples_leaf(self.params.min_samples_leaf as _)
            .with_min_samples_split(self.params.min_samples_split as _)
            .with_m(self.params.max_features.clamp(1, FeatureVector::NUM_FEATURES))
            .with_seed(self.params.seed)
    }

    /// Train a model on all of the provided data
    pub fn train(
        &self,
        features: &[FeatureVector],
        targets: &[f64],
    ) -> Result<TrainedModel, TrainingError> {
        check_lengths(features, targets)?;

        let x = to_matrix(features);
        let y = targets.to_vec();
        self.fit(&x, &y, features.len())
    }

    /// Train on a seeded random split, holding out `test_size` of the samples
    pub fn train_with_holdout(
        &self,
        features: &[FeatureVector],
        targets: &[f64],
        test_size: f64,
    ) -> Result<TrainedModel, TrainingError> {
        check_lengths(features, targets)?;

        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(TrainingError::InvalidTestSize(test_size));
        }
        let n_test = (features.len() as f32 * test_size as f32) as usize;
        if n_test == 0 || n_test == features.len() {
            return Err(TrainingError::InsufficientData(features.len()));
        }

        let x = to_matrix(features);
        let y = targets.to_vec();
        let (x_train, x_test, y_train, y_test) =
            train_test_split(&x, &y, test_size as f32, true, Some(self.params.seed));

        let mut model = self.fit(&x_train, &y_train, y_train.len())?;

        let test_predictions = model
            .forest
            .predict(&x_test)
            .map_err(|e| TrainingError::PredictError(e.to_string()))?;
        model.test_rmse = Some(calculate_mse(&test_predictions, &y_test).sqrt());
        model.test_samples = y_test.len();

        Ok(model)
    }

    fn fit(
        &self,
        x: &DenseMatrix<f64>,
        y: &Vec<f64>,
        n_samples: usize,
    ) -> Result<TrainedModel, TrainingError> {
        let forest = RandomForestRegressor::fit(x, y, self.forest_parameters())
            .map_err(|e| TrainingError::FitError(e.to_string()))?;

        let predictions = forest
            .predict(x)
            .map_err(|e| TrainingError::PredictError(e.to_string()))?;
        let training_rmse = calculate_mse(&predictions, y).sqrt();

        Ok(TrainedModel {
            forest,
            params: self.params,
            training_samples: n_samples,
            test_samples: 0,
            training_rmse,
            test_rmse: None,
        })
    }
}

fn check_lengths(features: &[FeatureVector], targets: &[f64]) -> Result<(), TrainingError> {
    if features.is_empty() || targets.is_empty() {
        return Err(TrainingError::InsufficientData(0));
    }
    if features.len() != targets.len() {
        return Err(TrainingError::MismatchedLengths {
            features: features.len(),
            targets: targets.len(),
        });
    }
    Ok(())
}

fn to_matrix(features: &[FeatureVector]) -> DenseMatrix<f64> {
    let rows: Vec<Vec<f64>> = features.iter().map(FeatureVector::to_vec).collect();
    DenseMatrix::from_2d_vec(&rows)
}

/// Calculate mean squared error
fn calculate_mse(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return f64::MAX;
    }

    let sum_sq_error: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum();

    sum_sq_error / predictions.len() as f64
}

/// Errors that can occur during model training
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Insufficient data for training: {0} samples")]
    InsufficientData(usize),
    #[error("Feature and target lengths mismatch: {features} vs {targets}")]
    MismatchedLengths { features: usize, targets: usize },
    #[error("Test size must be between 0 and 1, got {0}")]
    InvalidTestSize(f64),
    #[error("Model fitting error: {0}")]
    FitError(String),
    #[error("Prediction error: {0}")]
    PredictError(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
