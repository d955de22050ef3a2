//! Append-only feedback log.
//!
//! Each human verdict on a prediction becomes one CSV row:
//! `timestamp,heartrate,speed,time_offset,mode,predicted_angle,feedback,adjusted_angle`.
//! Rows are never rewritten; the header is written when the file is created.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ml::types::{FeedbackType, MlError, RiderState, TrainingExample, WorkoutMode};

/// CSV header of the feedback log.
pub const FEEDBACK_HEADER: &str =
    "timestamp,heartrate,speed,time_offset,mode,predicted_angle,feedback,adjusted_angle";

/// One human correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// When the feedback was given
    pub timestamp: DateTime<Utc>,
    /// Rider state the prediction was made for
    pub state: RiderState,
    /// Model output at the time
    pub predicted_angle: f32,
    /// Verdict
    pub feedback: FeedbackType,
    /// Corrected label derived from the verdict
    pub adjusted_angle: f32,
}

impl FeedbackRecord {
    /// Training example carrying the corrected label.
    pub fn to_training_example(&self) -> TrainingExample {
        TrainingExample::new(self.state, self.adjusted_angle)
    }

    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.timestamp.to_rfc3339(),
            self.state.heartrate,
            self.state.speed,
            self.state.time_offset,
            self.state.mode.index(),
            self.predicted_angle,
            self.feedback,
            self.adjusted_angle,
        )
    }

    fn from_csv_row(line: &str) -> Result<Self, MlError> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 8 {
            return Err(MlError::SerializationError(format!(
                "expected 8 fields, found {}",
                fields.len()
            )));
        }

        let number = |idx: usize| -> Result<f32, MlError> {
            fields[idx].parse::<f32>().map_err(|e| {
                MlError::SerializationError(format!("field {} ('{}'): {}", idx, fields[idx], e))
            })
        };

        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .map_err(|e| MlError::SerializationError(e.to_string()))?
            .with_timezone(&Utc);
        let mode = fields[4]
            .parse::<u8>()
            .ok()
            .and_then(WorkoutMode::from_index)
            .ok_or_else(|| MlError::SerializationError(format!("invalid mode '{}'", fields[4])))?;

        Ok(Self {
            timestamp,
            state: RiderState::new(number(1)?, number(2)?, number(3)?, mode),
            predicted_angle: number(5)?,
            feedback: fields[6].parse()?,
            adjusted_angle: number(7)?,
        })
    }
}

/// Durable, append-only store of [`FeedbackRecord`]s.
///
/// Holds the full log in memory. A record is added to the in-memory view
/// before it is written, so it stays visible even when the write fails.
#[derive(Debug)]
pub struct FeedbackStore {
    path: PathBuf,
    records: Vec<FeedbackRecord>,
}

impl FeedbackStore {
    /// Open the log at `path`, loading existing records.
    ///
    /// A missing file is an empty log.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MlError> {
        let path = path.into();
        let records = read_feedback_log(&path)?;
        tracing::info!(
            "Opened feedback log {} ({} records)",
            path.display(),
            records.len()
        );
        Ok(Self { path, records })
    }

    /// Record a verdict on a prediction and persist it.
    pub fn record_feedback(
        &mut self,
        state: RiderState,
        predicted_angle: f32,
        feedback: FeedbackType,
    ) -> Result<FeedbackRecord, MlError> {
        let record = FeedbackRecord {
            timestamp: Utc::now(),
            state,
            predicted_angle,
            feedback,
            adjusted_angle: feedback.adjust(predicted_angle),
        };
        self.records.push(record.clone());

        self.append(&record)?;
        tracing::info!(
            "Feedback '{}' recorded: {:.2} -> {:.2}",
            feedback,
            predicted_angle,
            record.adjusted_angle
        );
        Ok(record)
    }

    /// All records in append order.
    pub fn load_all(&self) -> &[FeedbackRecord] {
        &self.records
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

    /// Append one row, rolling the file back to its prior length on failure.
    ///
    /// A file left without a trailing newline (a torn row from an earlier
    /// crash) is closed off first, so the new row always starts a line.
    fn append(&self, record: &FeedbackRecord) -> Result<(), MlError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persistence(&self.path, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| persistence(&self.path, e))?;
        let prior_len = file
            .metadata()
            .map_err(|e| persistence(&self.path, e))?
            .len();

        let mut chunk = String::new();
        if prior_len == 0 {
            chunk.push_str(FEEDBACK_HEADER);
            chunk.push('\n');
        } else if !ends_with_newline(&mut file, prior_len)
            .map_err(|e| persistence(&self.path, e))?
        {
            tracing::warn!("Feedback log {} ends mid-row, closing it off", self.path.display());
            chunk.push('\n');
        }
        chunk.push_str(&record.to_csv_row());
        chunk.push('\n');

        write_or_rollback(&mut file, prior_len, chunk.as_bytes())
            .map_err(|e| persistence(&self.path, e))
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> std::io::Result<bool> {
    file.seek(SeekFrom::Start(len.saturating_sub(1)))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Write and sync `bytes`, truncating back to `prior_len` if either fails.
fn write_or_rollback(file: &mut File, prior_len: u64, bytes: &[u8]) -> std::io::Result<()> {
    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_data()) {
        if let Err(rollback) = file.set_len(prior_len) {
            tracing::error!(
                "Could not truncate feedback log back to {} bytes: {}",
                prior_len,
                rollback
            );
        }
        return Err(e);
    }
    Ok(())
}

fn persistence(path: &Path, err: std::io::Error) -> MlError {
    MlError::PersistenceError(format!("{}: {}", path.display(), err))
}

/// Read a feedback log from disk. Malformed rows are skipped with a warning.
pub fn read_feedback_log(path: &Path) -> Result<Vec<FeedbackRecord>, MlError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(persistence(path, e)),
    };

    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with("timestamp,") {
            continue;
        }
        match FeedbackRecord::from_csv_row(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                "Skipping feedback row {} in {}: {}",
                line_no + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(records)
}
