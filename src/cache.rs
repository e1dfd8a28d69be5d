//! Lazily loaded dashboard artifacts.
//!
//! The cleaned dataset and the model artifact are read from disk on first
//! access and kept until the owner invalidates them, e.g. after a retrain.

use std::path::{Path, PathBuf};

use crate::config::PathsConfig;
use crate::dataset::{self, DatasetError, Observation};
use crate::ml::{PersistedModel, PersistenceError};

#[derive(Debug)]
pub struct ArtifactCache {
    dataset_path: PathBuf,
    model_path: PathBuf,
    dataset: Option<Vec<Observation>>,
    model: Option<PersistedModel>,
}

impl ArtifactCache {
    pub fn new(dataset_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            model_path: model_path.into(),
            dataset: None,
            model: None,
        }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.cleaned_data, &paths.model)
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Cleaned observations, loading them on first use.
    ///
    /// A failed load leaves the cache empty so the next call retries.
    pub fn dataset(&mut self) -> Result<&[Observation], DatasetError> {
        let records = match self.dataset.take() {
            Some(records) => records,
            None => {
                let records = dataset::load_observations(&self.dataset_path)?;
                tracing::debug!(
                    "Cached {} observations from {}",
                    records.len(),
                    self.dataset_path.display()
                );
                records
            }
        };
        Ok(self.dataset.insert(records))
    }

    /// Persisted model, loading it on first use.
    pub fn model(&mut self) -> Result<&PersistedModel, PersistenceError> {
        let model = match self.model.take() {
            Some(model) => model,
            None => {
                let model = PersistedModel::load(&self.model_path)?;
                tracing::debug!("Cached model from {}", self.model_path.display());
                model
            }
        };
        Ok(self.model.insert(model))
    }

    pub fn invalidate_dataset(&mut self) {
        self.dataset = None;
    }

    pub fn invalidate_model(&mut self) {
        self.model = None;
    }

    pub fn invalidate_all(&mut self) {
        self.invalidate_dataset();
        self.invalidate_model();
    }

    pub fn is_dataset_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::dataset::{Pollutant, write_observations};
    use crate::ml::ModelBuilder;
    use crate::ml::model::tests::create_test_data;

    fn observation(city: &str, day: u32, aqi: f64) -> Observation {
        Observation {
            city: city.to_string(),
            date: NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
            pollutants: [aqi / 3.0; Pollutant::COUNT],
            aqi,
            aqi_bucket: "Moderate".to_string(),
        }
    }

    fn save_model(path: &Path, n_trees: usize) {
        let (features, targets) = create_test_data(40);
        let model = ModelBuilder::new()
            .n_trees(n_trees)
            .max_depth(4)
            .train(&features, &targets)
            .unwrap();
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PersistedModel::new(model, created).save(path).unwrap();
    }

    #[test]
    fn test_nothing_loaded_until_first_access() {
        let cache = ArtifactCache::new("missing.csv", "missing.bin");

        assert!(!cache.is_dataset_loaded());
        assert!(!cache.is_model_loaded());
    }

    #[test]
    fn test_dataset_loaded_once_and_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_observations(&path, &[observation("Delhi", 1, 150.0)]).unwrap();

        let mut cache = ArtifactCache::new(&path, dir.path().join("model.bin"));
        assert_eq!(cache.dataset().unwrap().len(), 1);

        // Cached copy survives the file changing underneath
        write_observations(
            &path,
            &[observation("Delhi", 1, 150.0), observation("Delhi", 2, 160.0)],
        )
        .unwrap();
        assert_eq!(cache.dataset().unwrap().len(), 1);

        cache.invalidate_dataset();
        assert!(!cache.is_dataset_loaded());
        assert_eq!(cache.dataset().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_dataset_is_not_cached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let mut cache = ArtifactCache::new(&path, dir.path().join("model.bin"));

        assert!(matches!(cache.dataset(), Err(DatasetError::MissingInput(_))));
        assert!(!cache.is_dataset_loaded());

        write_observations(&path, &[observation("Agra", 4, 90.0)]).unwrap();
        assert_eq!(cache.dataset().unwrap()[0].city, "Agra");
    }

    #[test]
    fn test_model_reloads_after_invalidation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save_model(&path, 3);

        let mut cache = ArtifactCache::new(dir.path().join("cleaned.csv"), &path);
        assert_eq!(cache.model().unwrap().model.params.n_trees, 3);

        save_model(&path, 5);
        assert_eq!(cache.model().unwrap().model.params.n_trees, 3);

        cache.invalidate_all();
        assert!(!cache.is_model_loaded());
        assert_eq!(cache.model().unwrap().model.params.n_trees, 5);
    }

    #[test]
    fn test_missing_model() {
        let dir = tempdir().unwrap();
        let mut cache = ArtifactCache::new("unused.csv", dir.path().join("nope.bin"));

        assert!(matches!(cache.model(), Err(PersistenceError::FileNotFound(_))));
    }
}
