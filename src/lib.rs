//! SmartBike - servo resistance model for a smart exercise bike
//!
//! Maps a rider's heart rate, speed, elapsed time and workout mode to a
//! resistance servo angle. Labels are synthesized from a heart-rate-to-power
//! calibration of the rider's running data, then corrected by feedback given
//! during interactive evaluation and folded back in on each retrain.

pub mod activity;
pub mod ml;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use activity::{ActivityStreamProvider, CsvActivityProvider};
pub use ml::{CalibrationEstimator, InferenceEngine, Model, Trainer};
pub use session::InteractiveSession;
pub use storage::{AppConfig, DriftTracker, FeedbackStore};
