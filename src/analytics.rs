use chrono::NaiveDate;
use serde::Serialize;

use crate::advisor::AqiCategory;
use crate::dataset::{Observation, Pollutant};

// ==================== Date Ranges ====================

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Earliest and latest date among `records`.
pub fn date_bounds<'a, I>(records: I) -> Option<DateRange>
where
    I: IntoIterator<Item = &'a Observation>,
{
    records.into_iter().fold(None, |range, obs| {
        Some(match range {
            None => DateRange {
                start: obs.date,
                end: obs.date,
            },
            Some(r) => DateRange {
                start: r.start.min(obs.date),
                end: r.end.max(obs.date),
            },
        })
    })
}

/// Records of `city` dated within `range`, in input order.
pub fn filter_city_range<'a>(
    records: &'a [Observation],
    city: &str,
    range: DateRange,
) -> Vec<&'a Observation> {
    records
        .iter()
        .filter(|obs| obs.city == city && range.contains(obs.date))
        .collect()
}

/// Sorted, de-duplicated city names.
pub fn cities(records: &[Observation]) -> Vec<String> {
    let mut names: Vec<String> = records.iter().map(|obs| obs.city.clone()).collect();
    names.sort();
    names.dedup();
    names
}

// ==================== Statistical Analysis ====================

/// Statistical summary of a numeric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    /// Arithmetic mean
    pub mean: f64,
    /// Median value
    pub median: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Number of samples
    pub sample_count: usize,
}

/// Summary statistics for a series of values.
pub fn calculate_stats(values: &[f64]) -> Option<SeriesStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    Some(SeriesStats {
        mean,
        median,
        std_dev,
        min: sorted[0],
        max: sorted[n - 1],
        sample_count: n,
    })
}

/// AQI statistics over `records`.
pub fn aqi_stats(records: &[&Observation]) -> Option<SeriesStats> {
    let values: Vec<f64> = records.iter().map(|obs| obs.aqi).collect();
    calculate_stats(&values)
}

/// Statistics for one pollutant over `records`.
pub fn pollutant_stats(records: &[&Observation], pollutant: Pollutant) -> Option<SeriesStats> {
    let values: Vec<f64> = records.iter().map(|obs| obs.pollutant(pollutant)).collect();
    calculate_stats(&values)
}

/// Number of records per AQI bucket, most severe last. Unknown labels are skipped.
pub fn bucket_counts(records: &[&Observation]) -> Vec<(AqiCategory, usize)> {
    AqiCategory::ALL
        .into_iter()
        .map(|category| {
            let count = records
                .iter()
                .filter(|obs| AqiCategory::from_label(&obs.aqi_bucket) == Some(category))
                .count();
            (category, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}
