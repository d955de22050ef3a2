//! Interactive evaluation session.
//!
//! A state machine driven by single-letter commands. Browse the probe
//! scenarios, rate predictions, retrain on the accumulated feedback and watch
//! how each retrain moves the prediction of the scenario under observation.

pub mod report;
pub mod types;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::ml::calibration::CalibrationProfile;
use crate::ml::inference::InferenceEngine;
use crate::ml::trainer::Trainer;
use crate::ml::types::{FeedbackType, MlError};
use crate::storage::drift_log::HISTORY_VIEW_LEN;
use crate::storage::{DriftTracker, FeedbackStore};

pub use types::{default_scenarios, Command, Outcome, ProbeScenario, SessionState};

/// Interactive session over the active model, feedback log and drift log.
pub struct InteractiveSession {
    state: SessionState,
    scenarios: Vec<ProbeScenario>,
    cursor: usize,
    /// Prediction last shown for the current scenario
    last_prediction: Option<f32>,
    /// Prediction captured at the start of a retrain
    pending_angle_before: Option<f32>,
    engine: InferenceEngine,
    trainer: Trainer,
    calibration: CalibrationProfile,
    feedback: FeedbackStore,
    drift: DriftTracker,
    /// Where a retrained model is written, if anywhere
    model_path: Option<PathBuf>,
}

impl InteractiveSession {
    /// Create a session over the default probe scenarios.
    pub fn new(
        engine: InferenceEngine,
        trainer: Trainer,
        calibration: CalibrationProfile,
        feedback: FeedbackStore,
        drift: DriftTracker,
    ) -> Self {
        Self {
            state: SessionState::Browsing,
            scenarios: default_scenarios(),
            cursor: 0,
            last_prediction: None,
            pending_angle_before: None,
            engine,
            trainer,
            calibration,
            feedback,
            drift,
            model_path: None,
        }
    }

    /// Replace the probe scenarios. An empty list is ignored.
    pub fn with_scenarios(mut self, scenarios: Vec<ProbeScenario>) -> Self {
        if scenarios.is_empty() {
            tracing::warn!("Ignoring empty scenario list");
        } else {
            self.scenarios = scenarios;
            self.cursor = 0;
            self.last_prediction = None;
        }
        self
    }

    /// Persist every retrained model to `path` before it goes live.
    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_scenario(&self) -> &ProbeScenario {
        &self.scenarios[self.cursor]
    }

    pub fn scenarios(&self) -> &[ProbeScenario] {
        &self.scenarios
    }

    pub fn pending_angle_before(&self) -> Option<f32> {
        self.pending_angle_before
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn feedback_store(&self) -> &FeedbackStore {
        &self.feedback
    }

    pub fn drift_tracker(&self) -> &DriftTracker {
        &self.drift
    }

    /// Predict the current scenario and remember the result.
    pub fn show_current(&mut self) -> Outcome {
        let scenario = self.current_scenario().clone();
        let angle = self.engine.predict(&scenario.state);
        self.last_prediction = Some(angle);
        Outcome::Prediction { scenario, angle }
    }

    /// Handle one line of user input.
    ///
    /// `InvalidSelection` leaves the session browsing with nothing changed.
    /// Any other error aborts the command and also returns to browsing.
    pub fn handle(&mut self, input: &str) -> Result<Outcome, MlError> {
        match self.state {
            SessionState::Terminated => Ok(Outcome::Terminated),
            SessionState::ViewingHistory => {
                self.state = SessionState::Browsing;
                Ok(self.show_current())
            }
            SessionState::CollectingFeedback => {
                self.state = SessionState::Browsing;
                let feedback = FeedbackType::from_selection(input)?;
                self.submit_feedback(feedback)
            }
            SessionState::Browsing | SessionState::Retraining => {
                self.state = SessionState::Browsing;
                let command = Command::parse(input)?;
                self.dispatch(command)
            }
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<Outcome, MlError> {
        match command {
            Command::Next => {
                self.cursor = (self.cursor + 1) % self.scenarios.len();
                self.pending_angle_before = None;
                Ok(self.show_current())
            }
            Command::Feedback => {
                let angle = self.current_prediction();
                self.state = SessionState::CollectingFeedback;
                Ok(Outcome::AwaitingFeedback {
                    scenario: self.current_scenario().clone(),
                    angle,
                })
            }
            Command::Retrain => {
                self.state = SessionState::Retraining;
                let result = self.retrain_current();
                self.state = SessionState::Browsing;
                result
            }
            Command::ViewHistory => {
                self.state = SessionState::ViewingHistory;
                Ok(Outcome::History(self.drift.recent(HISTORY_VIEW_LEN)))
            }
            Command::Quit => {
                self.state = SessionState::Terminated;
                tracing::info!("Session terminated");
                Ok(Outcome::Terminated)
            }
        }
    }

    fn current_prediction(&mut self) -> f32 {
        match self.last_prediction {
            Some(angle) => angle,
            None => {
                let angle = self.engine.predict(&self.current_scenario().state);
                self.last_prediction = Some(angle);
                angle
            }
        }
    }

    fn submit_feedback(&mut self, feedback: FeedbackType) -> Result<Outcome, MlError> {
        let angle = self.current_prediction();
        let state = self.current_scenario().state;
        let record = self.feedback.record_feedback(state, angle, feedback)?;
        Ok(Outcome::FeedbackRecorded(record))
    }

    /// Retrain, swap the model in and log the current scenario's drift.
    ///
    /// The old model stays active if any step before the swap fails.
    fn retrain_current(&mut self) -> Result<Outcome, MlError> {
        let scenario = self.current_scenario().clone();
        let angle_before = self.engine.predict(&scenario.state);
        self.pending_angle_before = Some(angle_before);

        let model = self
            .trainer
            .retrain_default(&self.calibration, &self.feedback)?;
        if let Some(path) = &self.model_path {
            model.save(path)?;
        }
        self.engine.swap(model);

        let angle_after = self.engine.predict(&scenario.state);
        self.last_prediction = Some(angle_after);
        let record = self
            .drift
            .record(&scenario.label, &scenario.state, angle_before, angle_after)?;
        self.pending_angle_before = None;

        Ok(Outcome::Retrained(record))
    }

    /// Drive the session from a line reader until quit or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> std::io::Result<()> {
        write!(out, "{}", report::render_scenario_table(&self.engine, &self.scenarios))?;
        writeln!(out)?;
        write!(out, "{}", report::render_outcome(&self.show_current()))?;

        let mut lines = input.lines();
        while self.state != SessionState::Terminated {
            write!(out, "{}", report::prompt(self.state))?;
            out.flush()?;

            let line = match lines.next() {
                Some(line) => line?,
                None => {
                    self.state = SessionState::Terminated;
                    break;
                }
            };

            match self.handle(&line) {
                Ok(outcome) => write!(out, "{}", report::render_outcome(&outcome))?,
                Err(e) if e.is_recoverable() => writeln!(out, "{}", e)?,
                Err(e) => {
                    tracing::error!("Command failed: {}", e);
                    writeln!(out, "Command failed: {}", e)?;
                }
            }
        }
        Ok(())
    }
}
