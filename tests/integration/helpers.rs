//! Shared fixtures for integration tests.

use smartbike::activity::ActivitySample;
use smartbike::ml::trainer::TrainerConfig;
use smartbike::ml::{CalibrationProfile, RiderState, SyntheticLabelGenerator, Trainer};

/// Calibration with a 2 W/bpm slope over a typical heart rate range.
pub fn profile() -> CalibrationProfile {
    CalibrationProfile {
        rest_hr: 60.0,
        fitness_slope: 2.0,
        hr_min: 90.0,
        hr_max: 190.0,
        time_max: 3600.0,
    }
}

/// Trainer small enough for tests but able to learn the label formula.
pub fn quick_trainer(seed: u64) -> Trainer {
    Trainer::new(TrainerConfig {
        epochs: 40,
        learning_rate: 0.01,
        synthetic_count: 2000,
        seed: Some(seed),
        ..TrainerConfig::default()
    })
}

/// Trainer that only needs to produce some model quickly.
pub fn tiny_trainer(seed: u64) -> Trainer {
    Trainer::new(TrainerConfig {
        hidden_layers: vec![8],
        epochs: 2,
        synthetic_count: 200,
        seed: Some(seed),
        ..TrainerConfig::default()
    })
}

/// Label the default formula gives a state.
pub fn formula_angle(state: &RiderState) -> f32 {
    SyntheticLabelGenerator::default().target_angle(&profile(), state)
}

pub fn sample(activity_id: u64, time: f32, hr: Option<f32>, watts: Option<f32>) -> ActivitySample {
    ActivitySample {
        activity_id,
        time_offset: time,
        heartrate: hr,
        watts,
    }
}
