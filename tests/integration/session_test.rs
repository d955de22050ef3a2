//! Interactive session state machine.

use std::io::Cursor;
use std::path::Path;

use smartbike::ml::types::clamp_angle;
use smartbike::ml::{FeedbackType, InferenceEngine, MlError, Model};
use smartbike::session::{InteractiveSession, Outcome, SessionState};
use smartbike::storage::{DriftTracker, FeedbackStore};

use crate::helpers::{profile, tiny_trainer};

fn build_session(dir: &Path) -> InteractiveSession {
    let feedback = FeedbackStore::open(dir.join("feedback.csv")).unwrap();
    let drift = DriftTracker::open(dir.join("drift.json")).unwrap();
    let mut trainer = tiny_trainer(5);
    let model: Model = trainer.retrain_default(&profile(), &feedback).unwrap();

    InteractiveSession::new(InferenceEngine::new(model), trainer, profile(), feedback, drift)
}

#[test]
fn test_starts_browsing_and_cycles_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());
    assert_eq!(session.state(), SessionState::Browsing);
    assert_eq!(session.cursor(), 0);

    let count = session.scenarios().len();
    for step in 1..=count + 1 {
        match session.handle("N").unwrap() {
            Outcome::Prediction { scenario, angle } => {
                assert_eq!(scenario, session.scenarios()[step % count]);
                // Raw regressor output is unclamped, so only finiteness is guaranteed.
                assert!(angle.is_finite());
                assert_eq!(angle, session.engine().predict(&scenario.state));
                let clamped = session.engine().predict_clamped(&scenario.state);
                assert!((0.0..=180.0).contains(&clamped));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(session.cursor(), step % count);
    }
}

#[test]
fn test_feedback_is_recorded_for_current_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());

    let shown = match session.handle("f").unwrap() {
        Outcome::AwaitingFeedback { angle, .. } => angle,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(session.state(), SessionState::CollectingFeedback);

    let record = match session.handle("2").unwrap() {
        Outcome::FeedbackRecorded(record) => record,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(session.state(), SessionState::Browsing);
    assert_eq!(record.feedback, FeedbackType::TooEasy);
    assert_eq!(record.predicted_angle, shown);
    assert_eq!(record.adjusted_angle, clamp_angle(shown + 15.0));
    assert_eq!(record.state, session.current_scenario().state);

    let reopened = FeedbackStore::open(dir.path().join("feedback.csv")).unwrap();
    assert_eq!(reopened.load_all(), &[record]);
}

#[test]
fn test_invalid_input_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());

    let err = session.handle("x").unwrap_err();
    assert!(matches!(err, MlError::InvalidSelection(_)));
    assert_eq!(session.state(), SessionState::Browsing);

    session.handle("F").unwrap();
    let err = session.handle("9").unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(session.state(), SessionState::Browsing);
    assert!(session.feedback_store().is_empty());
    assert!(!dir.path().join("feedback.csv").exists());
}

#[test]
fn test_retrain_records_drift_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());
    session.handle("N").unwrap();

    let before = session.engine().model();
    let record = match session.handle("G").unwrap() {
        Outcome::Retrained(record) => record,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(session.state(), SessionState::Browsing);
    assert_eq!(session.pending_angle_before(), None);
    assert_eq!(record.scenario_label, session.current_scenario().label);
    assert!((record.difference - (record.angle_after - record.angle_before)).abs() < 0.011);
    assert_ne!(*before, *session.engine().model());
    assert_eq!(session.drift_tracker().len(), 1);

    match session.handle("v").unwrap() {
        Outcome::History(records) => assert_eq!(records, vec![record]),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(session.state(), SessionState::ViewingHistory);

    // Any input leaves the history view.
    assert!(matches!(session.handle("").unwrap(), Outcome::Prediction { .. }));
    assert_eq!(session.state(), SessionState::Browsing);

    let reopened = DriftTracker::open(dir.path().join("drift.json")).unwrap();
    assert_eq!(reopened.len(), 1);
}

#[test]
fn test_history_view_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());
    for _ in 0..12 {
        session.handle("G").unwrap();
    }

    match session.handle("V").unwrap() {
        Outcome::History(records) => {
            assert_eq!(records.len(), 10);
            assert_eq!(records[0], session.drift_tracker().recent(1)[0]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_failed_drift_write_keeps_pending_marker() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());
    std::fs::create_dir(dir.path().join("drift.json.tmp")).unwrap();

    let err = session.handle("G").unwrap_err();
    assert!(matches!(err, MlError::PersistenceError(_)));
    assert_eq!(session.state(), SessionState::Browsing);
    assert!(session.pending_angle_before().is_some());
    assert!(!dir.path().join("drift.json").exists());

    session.handle("N").unwrap();
    assert_eq!(session.pending_angle_before(), None);
}

#[test]
fn test_quit_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());

    assert_eq!(session.handle("Q").unwrap(), Outcome::Terminated);
    assert_eq!(session.state(), SessionState::Terminated);
    for input in ["N", "F", "G", "garbage"] {
        assert_eq!(session.handle(input).unwrap(), Outcome::Terminated);
        assert_eq!(session.state(), SessionState::Terminated);
    }
}

#[test]
fn test_retrained_model_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.bin");
    let mut session = build_session(dir.path()).with_model_path(&model_path);

    session.handle("G").unwrap();
    let saved = Model::load(&model_path).unwrap();
    assert_eq!(saved, *session.engine().model());
}

#[test]
fn test_run_drives_session_from_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());
    let mut out = Vec::new();

    session
        .run(Cursor::new("N\nF\n1\nx\nV\n\nQ\n"), &mut out)
        .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Scenario"));
    assert!(text.contains("Invalid selection"));
    assert!(text.contains("No retrains recorded yet."));
    assert!(text.ends_with("Goodbye.\n"));
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.feedback_store().len(), 1);
    assert_eq!(session.feedback_store().load_all()[0].feedback, FeedbackType::Good);
}

#[test]
fn test_run_stops_at_end_of_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = build_session(dir.path());
    let mut out = Vec::new();

    session.run(Cursor::new("N\n"), &mut out).unwrap();
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.cursor(), 1);
}
