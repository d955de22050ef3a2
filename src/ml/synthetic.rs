//! Synthetic label generation.
//!
//! Without a resistance sensor there are no observed labels. Training targets
//! come from the calibration formula:
//!
//! ```text
//! watts = (hr - rest_hr) * fitness_slope   (x hiit_multiplier in HIIT mode)
//! angle = clamp(watts / speed * resistance_constant, 0, 180)
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::calibration::CalibrationProfile;
use super::types::{clamp_angle, RiderState, TrainingExample, WorkoutMode};

/// Lowest sampled speed in m/s. Keeps the angle formula's denominator away from zero.
pub const SPEED_MIN: f32 = 2.0;

/// Highest sampled speed in m/s.
pub const SPEED_MAX: f32 = 12.0;

/// Default HIIT power multiplier.
pub const DEFAULT_HIIT_MULTIPLIER: f32 = 1.3;

/// Default watts-per-speed to servo degrees factor.
pub const DEFAULT_RESISTANCE_CONSTANT: f32 = 2.2;

/// Tunables of the labelling formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Power multiplier applied in HIIT mode
    pub hiit_multiplier: f32,
    /// Scales watts per m/s into servo degrees
    pub resistance_constant: f32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            hiit_multiplier: DEFAULT_HIIT_MULTIPLIER,
            resistance_constant: DEFAULT_RESISTANCE_CONSTANT,
        }
    }
}

/// Generates labelled examples from a calibration profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticLabelGenerator {
    config: SyntheticConfig,
}

impl SyntheticLabelGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Servo angle the formula assigns to a rider state.
    pub fn target_angle(&self, profile: &CalibrationProfile, state: &RiderState) -> f32 {
        let mut watts = profile.predicted_watts(state.heartrate);
        if state.mode == WorkoutMode::Hiit {
            watts *= self.config.hiit_multiplier;
        }
        clamp_angle(watts / state.speed * self.config.resistance_constant)
    }

    /// Draw `count` examples uniformly over the calibrated domain.
    pub fn generate<R: Rng>(
        &self,
        profile: &CalibrationProfile,
        count: usize,
        rng: &mut R,
    ) -> Vec<TrainingExample> {
        (0..count)
            .map(|_| {
                let state = RiderState {
                    heartrate: uniform(rng, profile.hr_min, profile.hr_max),
                    speed: uniform(rng, SPEED_MIN, SPEED_MAX),
                    time_offset: uniform(rng, 0.0, profile.time_max),
                    mode: if rng.gen_bool(0.5) {
                        WorkoutMode::Hiit
                    } else {
                        WorkoutMode::LongDistance
                    },
                };
                TrainingExample::new(state, self.target_angle(profile, &state))
            })
            .collect()
    }
}

/// Uniform draw that tolerates a degenerate range.
fn uniform<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}
