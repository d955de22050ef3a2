//! Drift tracking across retrains.
//!
//! Every retrain re-evaluates the scenario under observation and stores the
//! before/after angles. The log is a JSON array rewritten in full on each
//! append; it stays small (one entry per user-triggered retrain).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::write_atomic;
use crate::ml::types::{MlError, RiderState, WorkoutMode};

/// Entries shown by the history view.
pub const HISTORY_VIEW_LEN: usize = 10;

/// Before/after prediction of one probe scenario at a retrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleDifferenceRecord {
    pub timestamp: DateTime<Utc>,
    /// Probe scenario label
    #[serde(rename = "scenario")]
    pub scenario_label: String,
    #[serde(rename = "hr")]
    pub heartrate: f32,
    pub speed: f32,
    #[serde(rename = "time")]
    pub time_offset: f32,
    pub mode: WorkoutMode,
    pub angle_before: f32,
    pub angle_after: f32,
    /// `angle_after - angle_before`
    pub difference: f32,
}

impl AngleDifferenceRecord {
    pub fn state(&self) -> RiderState {
        RiderState::new(self.heartrate, self.speed, self.time_offset, self.mode)
    }
}

/// Round to two decimals, the precision the log keeps.
fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Append-only log of [`AngleDifferenceRecord`]s.
#[derive(Debug)]
pub struct DriftTracker {
    path: PathBuf,
    records: Vec<AngleDifferenceRecord>,
}

impl DriftTracker {
    /// Open the log at `path`. A missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MlError> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(MlError::PersistenceError(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };
        tracing::info!(
            "Opened drift log {} ({} records)",
            path.display(),
            records.len()
        );
        Ok(Self { path, records })
    }

    /// Append a before/after pair and rewrite the log.
    ///
    /// On write failure the file keeps its previous content; the record stays
    /// in the in-memory view.
    pub fn record(
        &mut self,
        scenario_label: &str,
        state: &RiderState,
        angle_before: f32,
        angle_after: f32,
    ) -> Result<AngleDifferenceRecord, MlError> {
        let record = AngleDifferenceRecord {
            timestamp: Utc::now(),
            scenario_label: scenario_label.to_string(),
            heartrate: state.heartrate,
            speed: state.speed,
            time_offset: state.time_offset,
            mode: state.mode,
            angle_before: round2(angle_before),
            angle_after: round2(angle_after),
            difference: round2(angle_after - angle_before),
        };
        self.records.push(record.clone());

        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes())?;

        tracing::info!(
            "Drift for '{}': {:.2} -> {:.2} ({:+.2})",
            record.scenario_label,
            record.angle_before,
            record.angle_after,
            record.difference
        );
        Ok(record)
    }

    /// The last `k` records, most recent first.
    pub fn recent(&self, k: usize) -> Vec<AngleDifferenceRecord> {
        self.records.iter().rev().take(k).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
