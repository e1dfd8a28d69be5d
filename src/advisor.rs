//! AQI categories and their health advice.

use std::fmt;

use serde::Serialize;

/// Severity band of an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Satisfactory,
        AqiCategory::Moderate,
        AqiCategory::Poor,
        AqiCategory::VeryPoor,
        AqiCategory::Severe,
    ];

    /// Band containing `aqi`. Upper bounds are inclusive.
    pub fn from_aqi(aqi: f64) -> Self {
        match aqi {
            a if a <= 50.0 => AqiCategory::Good,
            a if a <= 100.0 => AqiCategory::Satisfactory,
            a if a <= 200.0 => AqiCategory::Moderate,
            a if a <= 300.0 => AqiCategory::Poor,
            a if a <= 400.0 => AqiCategory::VeryPoor,
            _ => AqiCategory::Severe,
        }
    }

    /// Label as used in the `AQI_Bucket` column.
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Satisfactory => "Satisfactory",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Poor => "Poor",
            AqiCategory::VeryPoor => "Very Poor",
            AqiCategory::Severe => "Severe",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Minimal impact. Enjoy outdoor activities.",
            AqiCategory::Satisfactory => "Minor breathing discomfort to sensitive people.",
            AqiCategory::Moderate => {
                "Breathing discomfort to people with lung disease, and children."
            }
            AqiCategory::Poor => "Breathing discomfort to most people on prolonged exposure.",
            AqiCategory::VeryPoor => "Respiratory illness on prolonged exposure.",
            AqiCategory::Severe => {
                "Affects healthy people and seriously impacts those with existing diseases."
            }
        }
    }

    /// Display colour as a hex string.
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "#4CAF50",
            AqiCategory::Satisfactory => "#FFEB3B",
            AqiCategory::Moderate => "#FF9800",
            AqiCategory::Poor => "#f44336",
            AqiCategory::VeryPoor => "#9C27B0",
            AqiCategory::Severe => "#795548",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
