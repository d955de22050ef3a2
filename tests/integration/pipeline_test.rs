//! Calibration, label synthesis and retraining end to end.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use smartbike::activity::{csv_provider::parse_activity_csv, ActivityStreamProvider, ActivityStreams};
use smartbike::ml::synthetic::SyntheticConfig;
use smartbike::ml::{
    combine, CalibrationEstimator, FeedbackType, MlError, RiderState, SyntheticLabelGenerator,
    TrainingExample, WorkoutMode,
};
use smartbike::session::default_scenarios;
use smartbike::storage::FeedbackStore;

use crate::helpers::{formula_angle, profile, quick_trainer, sample};

#[test]
fn test_reference_calibration_scenario() {
    // mean HR 140, mean watts 160, rest 60 => 2.0 W/bpm
    let run = vec![
        sample(1, 0.0, Some(120.0), Some(140.0)),
        sample(1, 1.0, Some(160.0), Some(180.0)),
    ];
    let ride = vec![sample(2, 0.0, Some(110.0), None)];

    let profile = CalibrationEstimator::new(60.0).estimate(&run, &ride).unwrap();
    assert!((profile.fitness_slope - 2.0).abs() < 1e-6);

    let generator = SyntheticLabelGenerator::new(SyntheticConfig {
        hiit_multiplier: 1.3,
        resistance_constant: 2.2,
    });
    let state = RiderState::new(140.0, 8.0, 0.0, WorkoutMode::LongDistance);
    assert!((profile.predicted_watts(140.0) - 160.0).abs() < 1e-4);
    assert!((generator.target_angle(&profile, &state) - 44.0).abs() < 1e-3);
}

#[test]
fn test_csv_streams_to_calibration() {
    let run = parse_activity_csv(
        "activity_id,time_offset,heartrate,watts\n1,0,130,150\n1,1,150,170\n1,2,,\n",
    )
    .unwrap();
    let ride = parse_activity_csv(
        "activity_id,time_offset,heartrate,watts\n2,0,100,\n2,2400,175,\n",
    )
    .unwrap();
    let streams = ActivityStreams { run, ride }.load_streams().unwrap();

    let profile = CalibrationEstimator::default()
        .estimate(&streams.run, &streams.ride)
        .unwrap();
    assert!((profile.fitness_slope - 2.0).abs() < 1e-6);
    assert_eq!(profile.hr_min, 100.0);
    assert_eq!(profile.hr_max, 175.0);
    assert_eq!(profile.time_max, 2400.0);
}

#[test]
fn test_calibration_errors_propagate_from_retrain_path() {
    let dir = tempfile::tempdir().unwrap();
    let feedback = FeedbackStore::open(dir.path().join("feedback.csv")).unwrap();
    let streams = ActivityStreams {
        run: vec![sample(1, 0.0, Some(50.0), Some(100.0))],
        ride: vec![sample(2, 0.0, Some(120.0), None)],
    };

    let result = quick_trainer(1).train_from_activities(&CalibrationEstimator::new(60.0), &streams, &feedback);
    assert!(matches!(result, Err(MlError::CalibrationDomain { .. })));

    let empty = ActivityStreams::default();
    let result = quick_trainer(1).train_from_activities(&CalibrationEstimator::new(60.0), &empty, &feedback);
    assert!(matches!(result, Err(MlError::InsufficientData { .. })));
}

#[test]
fn test_empty_feedback_combine_and_retrain() {
    let dir = tempfile::tempdir().unwrap();
    let feedback = FeedbackStore::open(dir.path().join("feedback.csv")).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let synthetic = SyntheticLabelGenerator::default().generate(&profile(), 100, &mut rng);
    assert_eq!(combine(&synthetic, feedback.load_all(), 5), synthetic);

    let model = quick_trainer(3).retrain(&profile(), 300, &feedback, 5).unwrap();
    for scenario in default_scenarios() {
        assert!(model.predict(&scenario.state.to_input()).is_finite());
    }
}

#[test]
fn test_retrained_model_tracks_label_formula() {
    let dir = tempfile::tempdir().unwrap();
    let feedback = FeedbackStore::open(dir.path().join("feedback.csv")).unwrap();

    let first = quick_trainer(10).retrain_default(&profile(), &feedback).unwrap();
    let second = quick_trainer(20).retrain_default(&profile(), &feedback).unwrap();
    assert_ne!(first, second);

    for scenario in default_scenarios() {
        let input = scenario.state.to_input();
        let expected = formula_angle(&scenario.state);
        let (a, b) = (first.predict(&input), second.predict(&input));

        assert!((a - expected).abs() < 20.0, "{}: {} vs {}", scenario.label, a, expected);
        assert!((b - expected).abs() < 20.0, "{}: {} vs {}", scenario.label, b, expected);
    }
}

#[test]
fn test_weighted_feedback_pulls_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let no_feedback = FeedbackStore::open(dir.path().join("empty.csv")).unwrap();
    let mut feedback = FeedbackStore::open(dir.path().join("feedback.csv")).unwrap();

    let cruise = RiderState::new(135.0, 6.0, 1800.0, WorkoutMode::LongDistance);
    for _ in 0..100 {
        let record = feedback.record_feedback(cruise, 170.0, FeedbackType::TooEasy).unwrap();
        assert_eq!(record.adjusted_angle, 180.0);
    }

    let baseline = quick_trainer(7).retrain(&profile(), 2000, &no_feedback, 5).unwrap();
    let corrected = quick_trainer(7).retrain(&profile(), 2000, &feedback, 5).unwrap();

    let input = cruise.to_input();
    let before = baseline.predict(&input);
    let after = corrected.predict(&input);
    assert!(after > before + 20.0, "baseline {} corrected {}", before, after);
}

#[test]
fn test_combined_size_with_persisted_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedback.csv");
    {
        let mut store = FeedbackStore::open(&path).unwrap();
        for (i, feedback) in [FeedbackType::Good, FeedbackType::TooEasy, FeedbackType::TooHard]
            .into_iter()
            .enumerate()
        {
            let state = RiderState::new(120.0 + i as f32, 7.0, 60.0, WorkoutMode::Hiit);
            store.record_feedback(state, 90.0, feedback).unwrap();
        }
    }

    let store = FeedbackStore::open(&path).unwrap();
    let synthetic: Vec<TrainingExample> =
        SyntheticLabelGenerator::default().generate(&profile(), 40, &mut ChaCha8Rng::seed_from_u64(1));

    for weight in [0, 1, 3, 5] {
        let combined = combine(&synthetic, store.load_all(), weight);
        assert_eq!(combined.len(), 40 + weight * 3);
    }

    let combined = combine(&synthetic, store.load_all(), 3);
    let labels: Vec<f32> = combined[40..].iter().map(|e| e.target_angle).collect();
    assert_eq!(labels, vec![90.0, 90.0, 90.0, 105.0, 105.0, 105.0, 75.0, 75.0, 75.0]);
}
