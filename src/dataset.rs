//! City/day air-quality observations and their CSV representation.
//!
//! Raw and cleaned files share one schema:
//! `City, Date, <twelve pollutants>, AQI, AQI_Bucket`.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CITY_COLUMN: &str = "City";
pub const DATE_COLUMN: &str = "Date";
pub const AQI_COLUMN: &str = "AQI";
pub const BUCKET_COLUMN: &str = "AQI_Bucket";

/// Format used for every date written by this crate.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Accepted input dates. Non-ISO forms are read month first.
const INPUT_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y"];
const INPUT_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Cell contents treated as "no reading".
const MISSING_MARKERS: [&str; 17] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "#N/A",
    "#N/A N/A", "#NA", "<NA>", "1.#QNAN", "-1.#QNAN",
];

/// Number of numeric columns carried through imputation: every pollutant plus AQI.
pub const FILLED_COLUMNS: usize = Pollutant::COUNT + 1;

/// Position of AQI inside [`RawObservation::readings`].
pub const AQI_INDEX: usize = Pollutant::COUNT;

/// Pollutant columns, in model feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    Pm25,
    Pm10,
    No,
    No2,
    Nox,
    Nh3,
    Co,
    So2,
    O3,
    Benzene,
    Toluene,
    Xylene,
}

impl Pollutant {
    pub const COUNT: usize = 12;

    pub const ALL: [Pollutant; Self::COUNT] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No,
        Pollutant::No2,
        Pollutant::Nox,
        Pollutant::Nh3,
        Pollutant::Co,
        Pollutant::So2,
        Pollutant::O3,
        Pollutant::Benzene,
        Pollutant::Toluene,
        Pollutant::Xylene,
    ];

    /// Column header in the CSV schema.
    pub fn column(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No => "NO",
            Pollutant::No2 => "NO2",
            Pollutant::Nox => "NOx",
            Pollutant::Nh3 => "NH3",
            Pollutant::Co => "CO",
            Pollutant::So2 => "SO2",
            Pollutant::O3 => "O3",
            Pollutant::Benzene => "Benzene",
            Pollutant::Toluene => "Toluene",
            Pollutant::Xylene => "Xylene",
        }
    }

    /// Measurement unit of the concentration.
    pub fn unit(self) -> &'static str {
        match self {
            Pollutant::Nox => "ppb",
            Pollutant::Co => "mg/m³",
            _ => "μg/m³",
        }
    }

    /// Position in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_column(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.column().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Pollutant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_column(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|p| p.column()).collect();
            format!("unknown pollutant `{}` (expected one of {})", s, known.join(", "))
        })
    }
}

/// Header of a filled column by its index in [`RawObservation::readings`].
pub fn filled_column_name(index: usize) -> &'static str {
    Pollutant::ALL
        .get(index)
        .map(|p| p.column())
        .unwrap_or(AQI_COLUMN)
}

/// A row as read from disk, before cleaning.
///
/// Readings stay as text until coercion so that imputation copies exactly
/// what was in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    /// Empty when the cell was missing.
    pub city: String,
    pub date: Option<NaiveDate>,
    /// Pollutants in [`Pollutant::ALL`] order followed by AQI.
    pub readings: [Option<String>; FILLED_COLUMNS],
    pub aqi_bucket: Option<String>,
}

impl RawObservation {
    pub fn reading(&self, pollutant: Pollutant) -> Option<&str> {
        self.readings[pollutant.index()].as_deref()
    }

    pub fn aqi(&self) -> Option<&str> {
        self.readings[AQI_INDEX].as_deref()
    }
}

/// A fully populated row of the cleaned dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub city: String,
    pub date: NaiveDate,
    pub pollutants: [f64; Pollutant::COUNT],
    pub aqi: f64,
    pub aqi_bucket: String,
}

impl Observation {
    pub fn pollutant(&self, pollutant: Pollutant) -> f64 {
        self.pollutants[pollutant.index()]
    }

    /// Back to the raw representation, as it would be read from a cleaned file.
    pub fn to_raw(&self) -> RawObservation {
        let mut readings: [Option<String>; FILLED_COLUMNS] = Default::default();
        for (slot, value) in readings.iter_mut().zip(self.pollutants) {
            *slot = Some(format_number(value));
        }
        readings[AQI_INDEX] = Some(format_number(self.aqi));

        RawObservation {
            city: self.city.clone(),
            date: Some(self.date),
            readings,
            aqi_bucket: Some(self.aqi_bucket.clone()),
        }
    }

    fn from_raw(raw: RawObservation, row: usize) -> Result<Self, DatasetError> {
        let incomplete = |column: &'static str| DatasetError::IncompleteRecord { row, column };

        if raw.city.is_empty() {
            return Err(incomplete(CITY_COLUMN));
        }
        let date = raw.date.ok_or_else(|| incomplete(DATE_COLUMN))?;

        let mut values = [0.0; FILLED_COLUMNS];
        for (index, reading) in raw.readings.iter().enumerate() {
            values[index] = reading
                .as_deref()
                .and_then(parse_number)
                .ok_or_else(|| incomplete(filled_column_name(index)))?;
        }
        let aqi_bucket = raw.aqi_bucket.ok_or_else(|| incomplete(BUCKET_COLUMN))?;

        let mut pollutants = [0.0; Pollutant::COUNT];
        pollutants.copy_from_slice(&values[..Pollutant::COUNT]);

        Ok(Self {
            city: raw.city,
            date,
            pollutants,
            aqi: values[AQI_INDEX],
            aqi_bucket,
        })
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("required column `{column}` not found in {}", .path.display())]
    MissingColumn { column: &'static str, path: PathBuf },
    #[error("invalid date `{value}` on line {line}")]
    InvalidDate { line: u64, value: String },
    #[error("row {row} is incomplete: `{column}` is missing or not numeric")]
    IncompleteRecord { row: usize, column: &'static str },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Whether a raw cell counts as a missing reading.
pub fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell.trim())
}

/// Parse a numeric cell. Missing markers and NaN yield `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if is_missing(cell) {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a calendar date in any of the accepted input formats.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    INPUT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
        .or_else(|| {
            INPUT_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(cell, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn format_number(value: f64) -> String {
    value.to_string()
}

/// Header positions of the required columns.
struct ColumnIndex {
    city: usize,
    date: usize,
    filled: [usize; FILLED_COLUMNS],
    bucket: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, source: &Path) -> Result<Self, DatasetError> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| DatasetError::MissingColumn {
                    column,
                    path: source.to_path_buf(),
                })
        };

        let mut filled = [0; FILLED_COLUMNS];
        for (index, slot) in filled.iter_mut().enumerate() {
            *slot = find(filled_column_name(index))?;
        }

        Ok(Self {
            city: find(CITY_COLUMN)?,
            date: find(DATE_COLUMN)?,
            filled,
            bucket: find(BUCKET_COLUMN)?,
        })
    }
}

fn cell(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|value| !is_missing(value))
        .map(str::to_string)
}

/// Read raw observations from any CSV source. `source` is only used in errors.
pub fn read_raw<R: io::Read>(reader: R, source: &Path) -> Result<Vec<RawObservation>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnIndex::from_headers(reader.headers()?, source)?;

    let mut observations = Vec::new();
    for result in reader.records() {
        let record = result?;

        let date = match cell(&record, columns.date) {
            Some(value) => Some(parse_date(&value).ok_or_else(|| DatasetError::InvalidDate {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                value,
            })?),
            None => None,
        };

        let mut readings: [Option<String>; FILLED_COLUMNS] = Default::default();
        for (slot, &index) in readings.iter_mut().zip(columns.filled.iter()) {
            *slot = cell(&record, index);
        }

        observations.push(RawObservation {
            city: cell(&record, columns.city).unwrap_or_default(),
            date,
            readings,
            aqi_bucket: cell(&record, columns.bucket),
        });
    }

    Ok(observations)
}

fn open_input(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DatasetError::MissingInput(path.to_path_buf()),
        _ => DatasetError::Io(e),
    })
}

/// Load a raw dataset from disk.
pub fn load_raw(path: &Path) -> Result<Vec<RawObservation>, DatasetError> {
    let file = open_input(path)?;
    let observations = read_raw(file, path)?;
    tracing::debug!(path = %path.display(), rows = observations.len(), "Loaded raw dataset");
    Ok(observations)
}

/// Load a cleaned dataset. Every row must be complete.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>, DatasetError> {
    let observations = load_raw(path)?
        .into_iter()
        .enumerate()
        .map(|(i, raw)| Observation::from_raw(raw, i + 1))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(path = %path.display(), rows = observations.len(), "Loaded cleaned dataset");
    Ok(observations)
}

/// Header row of the shared schema.
pub fn schema_headers() -> Vec<&'static str> {
    let mut headers = vec![CITY_COLUMN, DATE_COLUMN];
    headers.extend(Pollutant::ALL.iter().map(|p| p.column()));
    headers.push(AQI_COLUMN);
    headers.push(BUCKET_COLUMN);
    headers
}

/// Write observations to any CSV sink.
pub fn write_to<W: io::Write>(writer: W, observations: &[Observation]) -> Result<(), DatasetError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(schema_headers())?;

    for obs in observations {
        let mut row = Vec::with_capacity(FILLED_COLUMNS + 3);
        row.push(obs.city.clone());
        row.push(obs.date.format(DATE_FORMAT).to_string());
        row.extend(obs.pollutants.iter().map(|&v| format_number(v)));
        row.push(format_number(obs.aqi));
        row.push(obs.aqi_bucket.clone());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write observations to `path`.
///
/// Rows go to a sibling temporary file that replaces `path` only once fully
/// written, so a failed run never leaves a truncated dataset behind.
pub fn write_observations(path: &Path, observations: &[Observation]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = File::create(&tmp_path)
        .map_err(DatasetError::from)
        .and_then(|file| write_to(file, observations));

    match result {
        Ok(()) => {
            fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}
