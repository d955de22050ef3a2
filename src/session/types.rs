//! Session states, commands and outcomes.

use serde::{Deserialize, Serialize};

use crate::ml::types::{MlError, RiderState, WorkoutMode};
use crate::storage::{AngleDifferenceRecord, FeedbackRecord};

/// State of the interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Showing the current probe scenario, waiting for a command
    #[default]
    Browsing,
    /// Waiting for a feedback selection
    CollectingFeedback,
    /// Retrain in progress
    Retraining,
    /// Showing drift history
    ViewingHistory,
    /// Session ended
    Terminated,
}

/// Single-letter command accepted while browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `N`: advance to the next scenario
    Next,
    /// `F`: give feedback on the current prediction
    Feedback,
    /// `G`: retrain and re-evaluate
    Retrain,
    /// `V`: view drift history
    ViewHistory,
    /// `Q`: quit
    Quit,
}

impl Command {
    /// Parse a command, ignoring case and surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self, MlError> {
        match input.trim().to_ascii_uppercase().as_str() {
            "N" => Ok(Command::Next),
            "F" => Ok(Command::Feedback),
            "G" => Ok(Command::Retrain),
            "V" => Ok(Command::ViewHistory),
            "Q" => Ok(Command::Quit),
            other => Err(MlError::InvalidSelection(format!(
                "unknown command '{}'",
                other
            ))),
        }
    }
}

/// A fixed rider state the model is evaluated on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeScenario {
    /// Display label
    pub label: String,
    /// Model input
    pub state: RiderState,
}

impl ProbeScenario {
    pub fn new(label: &str, heartrate: f32, speed: f32, time_offset: f32, mode: WorkoutMode) -> Self {
        Self {
            label: label.to_string(),
            state: RiderState::new(heartrate, speed, time_offset, mode),
        }
    }
}

/// The default evaluation scenarios.
pub fn default_scenarios() -> Vec<ProbeScenario> {
    vec![
        ProbeScenario::new("Warmup (Steady)", 105.0, 4.0, 120.0, WorkoutMode::LongDistance),
        ProbeScenario::new("HIIT Sprint Start", 140.0, 9.0, 600.0, WorkoutMode::Hiit),
        ProbeScenario::new("Deep in Sprint", 175.0, 10.5, 630.0, WorkoutMode::Hiit),
        ProbeScenario::new("Long Distance Cruise", 135.0, 6.0, 1800.0, WorkoutMode::LongDistance),
    ]
}

/// Result of handling one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Current scenario and its prediction
    Prediction {
        scenario: ProbeScenario,
        angle: f32,
    },
    /// Feedback prompt is open for this prediction
    AwaitingFeedback {
        scenario: ProbeScenario,
        angle: f32,
    },
    /// Feedback stored
    FeedbackRecorded(FeedbackRecord),
    /// Model retrained and swapped; drift of the current scenario
    Retrained(AngleDifferenceRecord),
    /// Most recent drift records, newest first
    History(Vec<AngleDifferenceRecord>),
    /// Session ended
    Terminated,
}
