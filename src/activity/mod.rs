//! Activity stream input.
//!
//! Historical heart rate / power samples arrive from an external provider
//! (the fitness-tracking export). Only the calibration step consumes them.

pub mod csv_provider;

use serde::{Deserialize, Serialize};

use crate::ml::types::MlError;

pub use csv_provider::CsvActivityProvider;

/// One second-by-second sample from a recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    /// Upstream activity identifier
    pub activity_id: u64,
    /// Seconds since activity start
    pub time_offset: f32,
    /// Heart rate in bpm, if the sensor reported one
    pub heartrate: Option<f32>,
    /// Power in watts, if the sensor reported one
    pub watts: Option<f32>,
}

impl ActivitySample {
    /// Heart rate when present and finite.
    pub fn valid_heartrate(&self) -> Option<f32> {
        self.heartrate.filter(|hr| hr.is_finite())
    }

    /// Power when present and finite.
    pub fn valid_watts(&self) -> Option<f32> {
        self.watts.filter(|w| w.is_finite())
    }
}

/// Run and ride sample sets for one calibration window.
#[derive(Debug, Clone, Default)]
pub struct ActivityStreams {
    /// Running samples (source of the fitness slope)
    pub run: Vec<ActivitySample>,
    /// Cycling samples (widen heart rate and time ranges)
    pub ride: Vec<ActivitySample>,
}

/// Supplier of historical activity samples.
pub trait ActivityStreamProvider {
    /// Load the run and ride collections.
    fn load_streams(&self) -> Result<ActivityStreams, MlError>;
}

impl ActivityStreamProvider for ActivityStreams {
    fn load_streams(&self) -> Result<ActivityStreams, MlError> {
        Ok(self.clone())
    }
}
