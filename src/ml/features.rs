//! Feature framing for the AQI model
//!
//! Turns cleaned observations into pollutant feature vectors and AQI targets.

use serde::{Deserialize, Serialize};

use crate::dataset::{Observation, Pollutant};

/// The twelve pollutant concentrations fed to the model
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub pm25: f64,
    pub pm10: f64,
    pub no: f64,
    pub no2: f64,
    pub nox: f64,
    pub nh3: f64,
    pub co: f64,
    pub so2: f64,
    pub o3: f64,
    pub benzene: f64,
    pub toluene: f64,
    pub xylene: f64,
}

impl FeatureVector {
    /// Number of features
    pub const NUM_FEATURES: usize = Pollutant::COUNT;

    /// Values in model input order (`PM2.5, PM10, NO, ... Xylene`)
    pub fn to_array(&self) -> [f64; Self::NUM_FEATURES] {
        [
            self.pm25,
            self.pm10,
            self.no,
            self.no2,
            self.nox,
            self.nh3,
            self.co,
            self.so2,
            self.o3,
            self.benzene,
            self.toluene,
            self.xylene,
        ]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    pub fn from_array(values: [f64; Self::NUM_FEATURES]) -> Self {
        let [pm25, pm10, no, no2, nox, nh3, co, so2, o3, benzene, toluene, xylene] = values;
        Self {
            pm25,
            pm10,
            no,
            no2,
            nox,
            nh3,
            co,
            so2,
            o3,
            benzene,
            toluene,
            xylene,
        }
    }

    /// Build from a slice in model input order; `None` if the length is wrong
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let array: [f64; Self::NUM_FEATURES] = values.try_into().ok()?;
        Some(Self::from_array(array))
    }

    pub fn get(&self, pollutant: Pollutant) -> f64 {
        self.to_array()[pollutant.index()]
    }

    /// Column names in model input order
    pub fn feature_names() -> Vec<&'static str> {
        Pollutant::ALL.iter().map(|p| p.column()).collect()
    }
}

impl From<&Observation> for FeatureVector {
    fn from(obs: &Observation) -> Self {
        Self::from_array(obs.pollutants)
    }
}

/// Split cleaned records into a feature matrix and the AQI target, row for row.
///
/// City, date and AQI bucket are not features.
pub fn split_features(records: &[Observation]) -> (Vec<FeatureVector>, Vec<f64>) {
    records
        .iter()
        .map(|obs| (FeatureVector::from(obs), obs.aqi))
        .unzip()
}
