//! Shared ML types and error definitions.
//!
//! Feature vectors, training examples and the error taxonomy used by the
//! calibration, training and feedback pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of model input features: `[heartrate, speed, time_offset, mode]`.
pub const FEATURE_COUNT: usize = 4;

/// Lowest servo angle in degrees.
pub const MIN_ANGLE: f32 = 0.0;

/// Highest servo angle in degrees.
pub const MAX_ANGLE: f32 = 180.0;

/// Clamp a value into the servo range.
///
/// NaN maps to the lowest angle so a broken prediction never drives the servo hard.
pub fn clamp_angle(angle: f32) -> f32 {
    if angle.is_nan() {
        return MIN_ANGLE;
    }
    angle.clamp(MIN_ANGLE, MAX_ANGLE)
}

/// Error types for ML operations.
#[derive(Debug, Error)]
pub enum MlError {
    /// Activity collections empty after filtering
    #[error("Insufficient data: {message}. {guidance}")]
    InsufficientData {
        /// What data is missing
        message: String,
        /// How to get more data
        guidance: String,
    },

    /// Slope denominator is not positive
    #[error(
        "Calibration domain error: mean heart rate {mean_hr:.1} bpm does not exceed resting heart rate {rest_hr:.1} bpm"
    )]
    CalibrationDomain {
        /// Mean heart rate of the running samples
        mean_hr: f32,
        /// Configured resting heart rate
        rest_hr: f32,
    },

    /// Durable log or artifact write failed
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Malformed interactive input
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Tensor operation failed
    #[error("Model error: {0}")]
    ModelError(String),

    /// Activity stream could not be read
    #[error("Activity data error: {0}")]
    ActivityError(String),
}

impl MlError {
    /// Whether the interactive session can simply re-prompt.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MlError::InvalidSelection(_))
    }
}

impl From<std::io::Error> for MlError {
    fn from(err: std::io::Error) -> Self {
        MlError::PersistenceError(err.to_string())
    }
}

impl From<serde_json::Error> for MlError {
    fn from(err: serde_json::Error) -> Self {
        MlError::SerializationError(err.to_string())
    }
}

impl From<candle_core::Error> for MlError {
    fn from(err: candle_core::Error) -> Self {
        MlError::ModelError(err.to_string())
    }
}

impl From<bincode::Error> for MlError {
    fn from(err: bincode::Error) -> Self {
        MlError::SerializationError(err.to_string())
    }
}

/// Workout mode flag fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkoutMode {
    /// Steady long-distance riding
    #[default]
    #[serde(rename = "Long")]
    LongDistance,
    /// High-intensity interval training
    #[serde(rename = "HIIT")]
    Hiit,
}

impl WorkoutMode {
    /// Numeric encoding used in feature vectors and the feedback log.
    pub fn index(&self) -> u8 {
        match self {
            WorkoutMode::LongDistance => 0,
            WorkoutMode::Hiit => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(WorkoutMode::LongDistance),
            1 => Some(WorkoutMode::Hiit),
            _ => None,
        }
    }

    pub fn as_feature(&self) -> f32 {
        self.index() as f32
    }

    /// Get display label.
    pub fn label(&self) -> &'static str {
        match self {
            WorkoutMode::LongDistance => "Long",
            WorkoutMode::Hiit => "HIIT",
        }
    }
}

impl std::fmt::Display for WorkoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Rider state at one instant; the model's input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiderState {
    /// Heart rate in bpm
    pub heartrate: f32,
    /// Speed in m/s
    pub speed: f32,
    /// Seconds since the start of the workout
    pub time_offset: f32,
    /// Workout mode
    pub mode: WorkoutMode,
}

impl RiderState {
    pub fn new(heartrate: f32, speed: f32, time_offset: f32, mode: WorkoutMode) -> Self {
        Self {
            heartrate,
            speed,
            time_offset,
            mode,
        }
    }

    /// Feature vector in model order.
    pub fn to_input(&self) -> [f32; FEATURE_COUNT] {
        [
            self.heartrate,
            self.speed,
            self.time_offset,
            self.mode.as_feature(),
        ]
    }
}

/// A labelled example for the regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Input features
    pub state: RiderState,
    /// Target servo angle (0-180)
    pub target_angle: f32,
}

impl TrainingExample {
    /// Create an example, clamping the label into the servo range.
    pub fn new(state: RiderState, target_angle: f32) -> Self {
        Self {
            state,
            target_angle: clamp_angle(target_angle),
        }
    }
}

/// Human verdict on a predicted resistance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    /// Resistance felt right
    Good,
    /// Resistance should go up
    TooEasy,
    /// Resistance should go down
    TooHard,
}

/// Degrees added or removed per corrective feedback.
pub const FEEDBACK_STEP_DEGREES: f32 = 15.0;

impl FeedbackType {
    /// Corrected label for a prediction, always inside the servo range.
    pub fn adjust(&self, predicted_angle: f32) -> f32 {
        let adjusted = match self {
            FeedbackType::Good => predicted_angle,
            FeedbackType::TooEasy => (predicted_angle + FEEDBACK_STEP_DEGREES).min(MAX_ANGLE),
            FeedbackType::TooHard => (predicted_angle - FEEDBACK_STEP_DEGREES).max(MIN_ANGLE),
        };
        clamp_angle(adjusted)
    }

    /// Map the interactive sub-selection (`1`, `2`, `3`).
    pub fn from_selection(input: &str) -> Result<Self, MlError> {
        match input.trim() {
            "1" => Ok(FeedbackType::Good),
            "2" => Ok(FeedbackType::TooEasy),
            "3" => Ok(FeedbackType::TooHard),
            other => Err(MlError::InvalidSelection(format!(
                "'{}' is not a feedback option (1 = good, 2 = too easy, 3 = too hard)",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Good => "good",
            FeedbackType::TooEasy => "too_easy",
            FeedbackType::TooHard => "too_hard",
        }
    }
}

impl std::str::FromStr for FeedbackType {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "good" => Ok(FeedbackType::Good),
            "too_easy" => Ok(FeedbackType::TooEasy),
            "too_hard" => Ok(FeedbackType::TooHard),
            other => Err(MlError::SerializationError(format!(
                "unknown feedback type '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
