//! CSV activity stream reader.
//!
//! Reads the `activity_id,time_offset,heartrate,watts` files produced by the
//! activity export. Missing values are empty cells.

use std::path::{Path, PathBuf};

use super::{ActivitySample, ActivityStreamProvider, ActivityStreams};
use crate::ml::types::MlError;

const REQUIRED_COLUMNS: [&str; 3] = ["activity_id", "time_offset", "heartrate"];

/// Reads run and ride streams from two CSV files.
#[derive(Debug, Clone)]
pub struct CsvActivityProvider {
    run_path: PathBuf,
    ride_path: PathBuf,
}

impl CsvActivityProvider {
    pub fn new(run_path: impl Into<PathBuf>, ride_path: impl Into<PathBuf>) -> Self {
        Self {
            run_path: run_path.into(),
            ride_path: ride_path.into(),
        }
    }
}

impl ActivityStreamProvider for CsvActivityProvider {
    fn load_streams(&self) -> Result<ActivityStreams, MlError> {
        let run = read_activity_csv(&self.run_path)?;
        let ride = read_activity_csv(&self.ride_path)?;
        tracing::info!(
            "Loaded {} run samples and {} ride samples",
            run.len(),
            ride.len()
        );
        Ok(ActivityStreams { run, ride })
    }
}

/// Read an activity CSV file.
pub fn read_activity_csv(path: &Path) -> Result<Vec<ActivitySample>, MlError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MlError::ActivityError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_activity_csv(&content)
}

/// Parse activity CSV content.
///
/// Columns are located by header name so extra columns are ignored. Rows that
/// cannot be parsed are skipped with a warning.
pub fn parse_activity_csv(content: &str) -> Result<Vec<ActivitySample>, MlError> {
    let mut lines = content.lines();
    let header = lines
        .next()
        .ok_or_else(|| MlError::ActivityError("CSV is empty".to_string()))?;

    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let find = |name: &str| columns.iter().position(|c| *c == name);

    for required in REQUIRED_COLUMNS {
        if find(required).is_none() {
            return Err(MlError::ActivityError(format!(
                "CSV header is missing column '{}'",
                required
            )));
        }
    }

    let id_col = find("activity_id").unwrap_or(0);
    let time_col = find("time_offset").unwrap_or(1);
    let hr_col = find("heartrate").unwrap_or(2);
    let watts_col = find("watts");

    let mut samples = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let parsed = (|| {
            let activity_id = parse_id(fields.get(id_col)?)?;
            let time_offset = parse_optional(fields.get(time_col).copied())?;
            Some(ActivitySample {
                activity_id,
                time_offset: time_offset?,
                heartrate: parse_optional(fields.get(hr_col).copied())?,
                watts: match watts_col {
                    Some(col) => parse_optional(fields.get(col).copied())?,
                    None => None,
                },
            })
        })();

        match parsed {
            Some(sample) => samples.push(sample),
            None => tracing::warn!("Skipping malformed activity row {}: {}", line_no + 2, line),
        }
    }

    Ok(samples)
}

/// Activity ids may have been written as floats by upstream tooling.
fn parse_id(field: &str) -> Option<u64> {
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().map(|v| v as u64))
}

/// `Some(None)` for an empty cell, `None` when the cell is not a number.
fn parse_optional(field: Option<&str>) -> Option<Option<f32>> {
    match field {
        None | Some("") => Some(None),
        Some(v) if v.eq_ignore_ascii_case("nan") => Some(None),
        Some(v) => v.parse::<f32>().ok().map(Some),
    }
}
