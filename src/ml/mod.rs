//! Machine learning pipeline for servo resistance.
//!
//! - Heart rate to power calibration from running data
//! - Synthetic label generation from the calibration
//! - Merging weighted human feedback into the training set
//! - Regressor training, retraining and swappable inference

pub mod calibration;
pub mod dataset;
pub mod inference;
pub mod network;
pub mod synthetic;
pub mod trainer;
pub mod types;

// Re-exports for convenience
pub use calibration::{CalibrationEstimator, CalibrationProfile};
pub use dataset::combine;
pub use inference::InferenceEngine;
pub use network::Model;
pub use synthetic::{SyntheticConfig, SyntheticLabelGenerator};
pub use trainer::{Trainer, TrainerConfig};
pub use types::{FeedbackType, MlError, RiderState, TrainingExample, WorkoutMode};
