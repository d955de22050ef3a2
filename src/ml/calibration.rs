//! Heart rate to power calibration.
//!
//! Estimates watts produced per heartbeat above rest from running data, and the
//! heart rate / time ranges the synthetic generator samples from.

use serde::{Deserialize, Serialize};

use super::types::MlError;
use crate::activity::ActivitySample;

/// Default resting heart rate in bpm.
pub const DEFAULT_REST_HR: f32 = 60.0;

/// Linear heart-rate-to-power relationship for one rider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Resting heart rate in bpm
    pub rest_hr: f32,
    /// Watts per beat above rest
    pub fitness_slope: f32,
    /// Lowest heart rate seen across run and ride samples
    pub hr_min: f32,
    /// Highest heart rate seen across run and ride samples
    pub hr_max: f32,
    /// Longest time offset seen, in seconds
    pub time_max: f32,
}

impl CalibrationProfile {
    /// Estimated power output at a heart rate.
    pub fn predicted_watts(&self, heartrate: f32) -> f32 {
        (heartrate - self.rest_hr) * self.fitness_slope
    }
}

/// Derives a [`CalibrationProfile`] from run and ride samples.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationEstimator {
    rest_hr: f32,
}

impl Default for CalibrationEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_REST_HR)
    }
}

impl CalibrationEstimator {
    pub fn new(rest_hr: f32) -> Self {
        Self { rest_hr }
    }

    pub fn rest_hr(&self) -> f32 {
        self.rest_hr
    }

    /// Estimate the calibration.
    ///
    /// Run samples need both heart rate and power; ride samples need heart
    /// rate. The slope comes from the run samples only.
    pub fn estimate(
        &self,
        run: &[ActivitySample],
        ride: &[ActivitySample],
    ) -> Result<CalibrationProfile, MlError> {
        let run: Vec<(f32, f32, f32)> = run
            .iter()
            .filter_map(|s| Some((s.valid_heartrate()?, s.valid_watts()?, s.time_offset)))
            .collect();
        let ride: Vec<(f32, f32)> = ride
            .iter()
            .filter_map(|s| Some((s.valid_heartrate()?, s.time_offset)))
            .collect();

        if run.is_empty() {
            return Err(MlError::InsufficientData {
                message: "No running samples with both heart rate and power".into(),
                guidance: "Record runs with a heart rate strap and a power-capable watch.".into(),
            });
        }
        if ride.is_empty() {
            return Err(MlError::InsufficientData {
                message: "No cycling samples with heart rate".into(),
                guidance: "Record at least one ride with a heart rate sensor.".into(),
            });
        }

        let heart_rates = run.iter().map(|r| r.0).chain(ride.iter().map(|r| r.0));
        let (hr_min, hr_max) = heart_rates.fold((f32::INFINITY, f32::NEG_INFINITY), |acc, hr| {
            (acc.0.min(hr), acc.1.max(hr))
        });
        let time_max = run
            .iter()
            .map(|r| r.2)
            .chain(ride.iter().map(|r| r.1))
            .fold(0.0_f32, f32::max);

        let mean_hr = mean(run.iter().map(|r| r.0));
        let mean_watts = mean(run.iter().map(|r| r.1));

        let denominator = mean_hr - self.rest_hr;
        if denominator <= 0.0 {
            return Err(MlError::CalibrationDomain {
                mean_hr,
                rest_hr: self.rest_hr,
            });
        }

        let fitness_slope = mean_watts / denominator;
        if fitness_slope <= 0.0 {
            tracing::warn!(
                "Non-positive fitness slope {:.3}; synthetic labels will all be zero",
                fitness_slope
            );
        }

        tracing::info!(
            "Calibration: slope {:.3} W/bpm, HR {:.0}-{:.0}, time max {:.0}s",
            fitness_slope,
            hr_min,
            hr_max,
            time_max
        );

        Ok(CalibrationProfile {
            rest_hr: self.rest_hr,
            fitness_slope,
            hr_min,
            hr_max,
            time_max,
        })
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0_f64, 0usize), |(sum, count), v| (sum + v as f64, count + 1));
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64) as f32
}
