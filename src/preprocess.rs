//! Data cleaning for the raw city/day dataset.
//!
//! The cleaning pass:
//! - Sorts rows by (City, Date)
//! - Fills gaps per city: forward fill, then backward fill, for every
//!   pollutant and AQI
//! - Drops rows without AQI or AQI_Bucket
//! - Coerces readings to numbers (unparseable values become missing)
//! - Drops rows that are still incomplete

use std::cmp::Ordering;
use std::path::Path;

use chrono::NaiveDate;

use crate::dataset::{
    self, AQI_INDEX, DatasetError, FILLED_COLUMNS, Observation, Pollutant, RawObservation,
    filled_column_name,
};

/// Summary of a cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub input_rows: usize,
    pub cities: usize,
    /// Rows without AQI or AQI_Bucket after filling.
    pub dropped_missing_target: usize,
    /// Rows with any other field still missing after coercion.
    pub dropped_incomplete: usize,
    /// Readings that failed numeric coercion.
    pub malformed_values: usize,
    pub output_rows: usize,
}

/// Clean raw observations. The input is left untouched.
pub fn clean(raw: &[RawObservation]) -> (Vec<Observation>, PreprocessSummary) {
    let mut summary = PreprocessSummary {
        input_rows: raw.len(),
        ..Default::default()
    };

    let mut records = raw.to_vec();
    sort_by_city_and_date(&mut records);
    summary.cities = fill_by_city(&mut records);

    records.retain(|r| r.aqi().is_some() && r.aqi_bucket.is_some());
    summary.dropped_missing_target = summary.input_rows - records.len();

    let mut cleaned = Vec::with_capacity(records.len());
    for record in records {
        match coerce(record, &mut summary.malformed_values) {
            Some(obs) => cleaned.push(obs),
            None => summary.dropped_incomplete += 1,
        }
    }
    summary.output_rows = cleaned.len();

    (cleaned, summary)
}

/// Load `input`, clean it and write the result to `output`.
///
/// Nothing is written unless the input was read successfully.
pub fn run_preprocess(input: &Path, output: &Path) -> Result<PreprocessSummary, DatasetError> {
    tracing::info!(input = %input.display(), "Starting data preprocessing");

    let raw = dataset::load_raw(input)?;
    let (cleaned, summary) = clean(&raw);

    if summary.dropped_incomplete > 0 {
        tracing::warn!(
            rows = summary.dropped_incomplete,
            "Dropped rows with columns that could not be filled"
        );
    }

    dataset::write_observations(output, &cleaned)?;

    tracing::info!(
        input_rows = summary.input_rows,
        output_rows = summary.output_rows,
        cities = summary.cities,
        output = %output.display(),
        "Preprocessing complete"
    );

    Ok(summary)
}

/// Stable sort by city, then date. Undated rows go last within their city.
fn sort_by_city_and_date(records: &mut [RawObservation]) {
    records.sort_by(|a, b| {
        a.city
            .cmp(&b.city)
            .then_with(|| compare_dates(a.date, b.date))
    });
}

fn compare_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Fill every column within each city. Expects `records` sorted by city.
///
/// Returns the number of city groups.
fn fill_by_city(records: &mut [RawObservation]) -> usize {
    let mut cities = 0;

    for group in records.chunk_by_mut(|a, b| a.city == b.city) {
        if group[0].city.is_empty() {
            continue;
        }
        cities += 1;

        for column in 0..FILLED_COLUMNS {
            fill_column(group, column);
        }
    }

    cities
}

/// Forward fill, then backward fill, one column of a date-ordered group.
///
/// A column with no value anywhere in the group stays missing.
pub fn fill_column(group: &mut [RawObservation], column: usize) {
    let mut carried: Option<String> = None;
    for record in group.iter_mut() {
        let slot = &mut record.readings[column];
        if slot.is_some() {
            carried.clone_from(slot);
        } else {
            slot.clone_from(&carried);
        }
    }

    let mut carried: Option<String> = None;
    for record in group.iter_mut().rev() {
        let slot = &mut record.readings[column];
        if slot.is_some() {
            carried.clone_from(slot);
        } else {
            slot.clone_from(&carried);
        }
    }
}

/// Convert a filled row into an observation, or `None` if anything is missing.
fn coerce(record: RawObservation, malformed: &mut usize) -> Option<Observation> {
    let mut values = [0.0; FILLED_COLUMNS];
    let mut complete = true;

    for (index, reading) in record.readings.iter().enumerate() {
        let Some(text) = reading else {
            complete = false;
            continue;
        };
        match dataset::parse_number(text) {
            Some(value) => values[index] = value,
            None => {
                *malformed += 1;
                complete = false;
                tracing::debug!(
                    city = %record.city,
                    column = filled_column_name(index),
                    value = %text,
                    "Coerced malformed value to missing"
                );
            }
        }
    }

    if !complete || record.city.is_empty() {
        return None;
    }
    let date = record.date?;
    let aqi_bucket = record.aqi_bucket?;

    let mut pollutants = [0.0; Pollutant::COUNT];
    pollutants.copy_from_slice(&values[..Pollutant::COUNT]);

    Some(Observation {
        city: record.city,
        date,
        pollutants,
        aqi: values[AQI_INDEX],
        aqi_bucket,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2020, 1, d)
    }

    /// A complete raw row with every reading set to "1".
    fn raw(city: &str, d: u32) -> RawObservation {
        let mut readings: [Option<String>; FILLED_COLUMNS] = Default::default();
        for slot in readings.iter_mut() {
            *slot = Some("1".to_string());
        }
        readings[AQI_INDEX] = Some("100".to_string());
        RawObservation {
            city: city.to_string(),
            date: day(d),
            readings,
            aqi_bucket: Some("Satisfactory".to_string()),
        }
    }

    fn with_reading(mut row: RawObservation, column: usize, value: Option<&str>) -> RawObservation {
        row.readings[column] = value.map(str::to_string);
        row
    }

    fn pm25(row: RawObservation, value: Option<&str>) -> RawObservation {
        with_reading(row, Pollutant::Pm25.index(), value)
    }

    #[test]
    fn test_forward_fill_wins_when_preceding_value_exists() {
        let input = vec![
            pm25(raw("A", 1), Some("10")),
            pm25(raw("A", 2), None),
            pm25(raw("A", 3), Some("30")),
        ];

        let (cleaned, summary) = clean(&input);

        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned[1].pollutant(Pollutant::Pm25), 10.0);
        assert_eq!(summary.output_rows, 3);
    }

    #[test]
    fn test_backward_fill_for_leading_gap() {
        let input = vec![pm25(raw("B", 1), None), pm25(raw("B", 2), Some("20"))];

        let (cleaned, _) = clean(&input);

        assert_eq!(cleaned[0].pollutant(Pollutant::Pm25), 20.0);
        assert_eq!(cleaned[1].pollutant(Pollutant::Pm25), 20.0);
    }

    #[test]
    fn test_fill_does_not_cross_cities() {
        let input = vec![
            pm25(raw("A", 1), Some("10")),
            pm25(raw("B", 1), None),
            pm25(raw("B", 2), Some("55")),
        ];

        let (cleaned, _) = clean(&input);

        let b: Vec<f64> = cleaned
            .iter()
            .filter(|o| o.city == "B")
            .map(|o| o.pollutant(Pollutant::Pm25))
            .collect();
        assert_eq!(b, vec![55.0, 55.0]);
    }

    #[test]
    fn test_fill_respects_date_order_not_input_order() {
        let input = vec![
            pm25(raw("A", 3), None),
            pm25(raw("A", 1), Some("10")),
            pm25(raw("A", 2), Some("20")),
        ];

        let (cleaned, _) = clean(&input);

        assert_eq!(cleaned[2].date, day(3).unwrap());
        assert_eq!(cleaned[2].pollutant(Pollutant::Pm25), 20.0);
    }

    #[test]
    fn test_city_without_any_pollutant_value_is_dropped_at_final_check() {
        let benzene = Pollutant::Benzene.index();
        let input = vec![
            with_reading(raw("C", 1), benzene, None),
            with_reading(raw("C", 2), benzene, None),
            raw("D", 1),
        ];

        let (cleaned, summary) = clean(&input);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].city, "D");
        assert_eq!(summary.dropped_missing_target, 0);
        assert_eq!(summary.dropped_incomplete, 2);
    }

    #[test]
    fn test_city_without_any_aqi_is_dropped_as_missing_target() {
        let input = vec![
            with_reading(raw("C", 1), AQI_INDEX, None),
            with_reading(raw("C", 2), AQI_INDEX, None),
        ];

        let (cleaned, summary) = clean(&input);

        assert!(cleaned.is_empty());
        assert_eq!(summary.dropped_missing_target, 2);
        assert_eq!(summary.dropped_incomplete, 0);
    }

    #[test]
    fn test_aqi_is_filled_but_bucket_is_not() {
        let mut no_bucket = raw("A", 2);
        no_bucket.aqi_bucket = None;
        let input = vec![
            raw("A", 1),
            with_reading(raw("A", 2), AQI_INDEX, None),
            no_bucket,
        ];

        let (cleaned, summary) = clean(&input);

        // The two rows dated day 2 keep their input order; only the first has a bucket.
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[1].aqi, 100.0);
        assert_eq!(summary.dropped_missing_target, 1);
    }

    #[test]
    fn test_malformed_value_becomes_missing_and_row_is_dropped() {
        let input = vec![pm25(raw("A", 1), Some("n/d")), raw("A", 2)];

        let (cleaned, summary) = clean(&input);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].date, day(2).unwrap());
        assert_eq!(summary.malformed_values, 1);
        assert_eq!(summary.dropped_incomplete, 1);
    }

    #[test]
    fn test_rows_without_city_or_date_are_dropped() {
        let mut undated = raw("A", 1);
        undated.date = None;
        let input = vec![raw("", 1), undated, raw("A", 2)];

        let (cleaned, summary) = clean(&input);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(summary.cities, 1);
        assert_eq!(summary.dropped_incomplete, 2);
    }

    #[test]
    fn test_output_sorted_by_city_then_date() {
        let input = vec![raw("Kolkata", 2), raw("Delhi", 3), raw("Kolkata", 1), raw("Delhi", 1)];

        let (cleaned, _) = clean(&input);

        let keys: Vec<(&str, NaiveDate)> =
            cleaned.iter().map(|o| (o.city.as_str(), o.date)).collect();
        assert_eq!(
            keys,
            vec![
                ("Delhi", day(1).unwrap()),
                ("Delhi", day(3).unwrap()),
                ("Kolkata", day(1).unwrap()),
                ("Kolkata", day(2).unwrap()),
            ]
        );
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = vec![pm25(raw("A", 2), None), pm25(raw("A", 1), Some("5"))];
        let before = input.clone();

        let _ = clean(&input);

        assert_eq!(input, before);
    }

    #[test]
    fn test_fill_column_leaves_all_missing_column_untouched() {
        let mut group = vec![pm25(raw("A", 1), None), pm25(raw("A", 2), None)];

        fill_column(&mut group, Pollutant::Pm25.index());

        assert!(group.iter().all(|r| r.reading(Pollutant::Pm25).is_none()));
    }

    #[test]
    fn test_run_preprocess_missing_input_writes_nothing() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("cleaned.csv");

        let result = run_preprocess(&dir.path().join("absent.csv"), &output);

        assert!(matches!(result, Err(DatasetError::MissingInput(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_run_preprocess_writes_cleaned_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("city_day.csv");
        let output = dir.path().join("cleaned.csv");
        std::fs::write(
            &input,
            "City,Date,PM2.5,PM10,NO,NO2,NOx,NH3,CO,SO2,O3,Benzene,Toluene,Xylene,AQI,AQI_Bucket\n\
             Delhi,2020-01-02,,2,3,4,5,6,7,8,9,10,11,12,150,Moderate\n\
             Delhi,2020-01-01,1,2,3,4,5,6,7,8,9,10,11,12,,\n",
        )
        .unwrap();

        let summary = run_preprocess(&input, &output).unwrap();
        let cleaned = dataset::load_observations(&output).unwrap();

        assert_eq!(summary.input_rows, 2);
        // Day 1 gets AQI back-filled from day 2 but has no bucket.
        assert_eq!(summary.dropped_missing_target, 1);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].pollutant(Pollutant::Pm25), 1.0);
    }

    #[test]
    fn test_run_preprocess_fills_in_month_first_date_order() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("city_day.csv");
        let output = dir.path().join("cleaned.csv");
        std::fs::write(
            &input,
            "City,Date,PM2.5,PM10,NO,NO2,NOx,NH3,CO,SO2,O3,Benzene,Toluene,Xylene,AQI,AQI_Bucket\n\
             Delhi,01/02/2020,10,2,3,4,5,6,7,8,9,10,11,12,150,Moderate\n\
             Delhi,02/01/2020,,2,3,4,5,6,7,8,9,10,11,12,150,Moderate\n\
             Delhi,01/03/2020,30,2,3,4,5,6,7,8,9,10,11,12,150,Moderate\n",
        )
        .unwrap();

        run_preprocess(&input, &output).unwrap();
        let cleaned = dataset::load_observations(&output).unwrap();

        let rows: Vec<(NaiveDate, f64)> = cleaned
            .iter()
            .map(|o| (o.date, o.pollutant(Pollutant::Pm25)))
            .collect();
        let date = |m, d| NaiveDate::from_ymd_opt(2020, m, d).unwrap();
        assert_eq!(
            rows,
            vec![(date(1, 2), 10.0), (date(1, 3), 30.0), (date(2, 1), 30.0)]
        );
    }

    // ==================== Property-Based Tests ====================

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        fn arb_row() -> impl Strategy<Value = RawObservation> {
            (
                0usize..3,
                1u32..=20,
                prop::option::weighted(0.7, 0.0f64..500.0),
                prop::option::weighted(0.7, 0.0f64..500.0),
                prop::bool::weighted(0.9),
            )
                .prop_map(|(city, d, pm, aqi, has_bucket)| {
                    let mut row = raw(["Delhi", "Mumbai", "Patna"][city], d);
                    row.readings[Pollutant::Pm25.index()] = pm.map(|v| v.to_string());
                    row.readings[AQI_INDEX] = aqi.map(|v| v.to_string());
                    if !has_bucket {
                        row.aqi_bucket = None;
                    }
                    row
                })
        }

        proptest! {
            #[test]
            fn output_never_larger_than_input(rows in prop::collection::vec(arb_row(), 0..60)) {
                let (cleaned, summary) = clean(&rows);
                prop_assert!(cleaned.len() <= rows.len());
                prop_assert_eq!(
                    summary.output_rows + summary.dropped_missing_target + summary.dropped_incomplete,
                    rows.len()
                );
            }

            #[test]
            fn output_sorted_by_city_and_date(rows in prop::collection::vec(arb_row(), 0..60)) {
                let (cleaned, _) = clean(&rows);
                for pair in cleaned.windows(2) {
                    prop_assert!((&pair[0].city, pair[0].date) <= (&pair[1].city, pair[1].date));
                }
            }

            #[test]
            fn cleaning_is_idempotent(rows in prop::collection::vec(arb_row(), 0..60)) {
                let (once, _) = clean(&rows);
                let raw_again: Vec<RawObservation> = once.iter().map(Observation::to_raw).collect();
                let (twice, summary) = clean(&raw_again);
                prop_assert_eq!(&twice, &once);
                prop_assert_eq!(summary.dropped_missing_target + summary.dropped_incomplete, 0);
            }

            #[test]
            fn cities_with_values_keep_all_bucketed_rows(rows in prop::collection::vec(arb_row(), 1..60)) {
                let (cleaned, _) = clean(&rows);
                for city in ["Delhi", "Mumbai", "Patna"] {
                    let city_rows: Vec<&RawObservation> = rows.iter().filter(|r| r.city == city).collect();
                    let has_pm = city_rows.iter().any(|r| r.reading(Pollutant::Pm25).is_some());
                    let has_aqi = city_rows.iter().any(|r| r.aqi().is_some());
                    if has_pm && has_aqi {
                        let bucketed = city_rows.iter().filter(|r| r.aqi_bucket.is_some()).count();
                        let kept = cleaned.iter().filter(|o| o.city == city).count();
                        prop_assert_eq!(kept, bucketed);
                    }
                }
            }
        }
    }
}
