//! Plain-text rendering for the interactive session.

use super::types::{Outcome, ProbeScenario, SessionState};
use crate::ml::inference::InferenceEngine;
use crate::storage::AngleDifferenceRecord;

/// Prompt shown for a session state.
pub fn prompt(state: SessionState) -> &'static str {
    match state {
        SessionState::Browsing => "[N]ext  [F]eedback  [G] retrain  [V]iew history  [Q]uit > ",
        SessionState::CollectingFeedback => "Feedback: 1 = good, 2 = too easy, 3 = too hard > ",
        SessionState::ViewingHistory => "Press Enter to continue > ",
        SessionState::Retraining | SessionState::Terminated => "",
    }
}

/// Evaluation table of every scenario against the active model.
pub fn render_scenario_table(engine: &InferenceEngine, scenarios: &[ProbeScenario]) -> String {
    let mut out = format!(
        "{:<22} | {:<5} | {:<5} | {:<6} | Servo Angle\n",
        "Scenario", "HR", "Speed", "Mode"
    );
    out.push_str(&"-".repeat(65));
    out.push('\n');
    for scenario in scenarios {
        let s = &scenario.state;
        out.push_str(&format!(
            "{:<22} | {:<5} | {:<5.1} | {:<6} | {:.2}°\n",
            scenario.label,
            s.heartrate,
            s.speed,
            s.mode.label(),
            engine.predict(s)
        ));
    }
    out
}

/// Drift history table, newest first.
pub fn render_history(records: &[AngleDifferenceRecord]) -> String {
    if records.is_empty() {
        return "No retrains recorded yet.\n".to_string();
    }

    let mut out = format!(
        "{:<20} | {:<22} | {:>8} | {:>8} | {:>8}\n",
        "Time", "Scenario", "Before", "After", "Change"
    );
    out.push_str(&"-".repeat(78));
    out.push('\n');
    for r in records {
        out.push_str(&format!(
            "{:<20} | {:<22} | {:>8.2} | {:>8.2} | {:>+8.2}\n",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.scenario_label,
            r.angle_before,
            r.angle_after,
            r.difference
        ));
    }
    out
}

/// Text for one outcome.
pub fn render_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Prediction { scenario, angle } => render_prediction(scenario, *angle),
        Outcome::AwaitingFeedback { scenario, angle } => {
            format!("Rate {:.2}° for '{}'\n", angle, scenario.label)
        }
        Outcome::FeedbackRecorded(record) => format!(
            "Saved '{}': {:.2}° -> {:.2}°\n",
            record.feedback, record.predicted_angle, record.adjusted_angle
        ),
        Outcome::Retrained(record) => format!(
            "Retrained. '{}': {:.2}° -> {:.2}° ({:+.2}°)\n",
            record.scenario_label, record.angle_before, record.angle_after, record.difference
        ),
        Outcome::History(records) => render_history(records),
        Outcome::Terminated => "Goodbye.\n".to_string(),
    }
}

fn render_prediction(scenario: &ProbeScenario, angle: f32) -> String {
    let s = &scenario.state;
    format!(
        "{} | HR {} | {:.1} m/s | {:.0}s | {} => {:.2}°\n",
        scenario.label, s.heartrate, s.speed, s.time_offset, s.mode, angle
    )
}
