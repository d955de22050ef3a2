//! Single-point inference over a swappable model.

use std::path::Path;
use std::sync::{Arc, RwLock};

use super::network::Model;
use super::types::{clamp_angle, MlError, RiderState};

/// Answers predictions from the currently active [`Model`].
///
/// The model sits behind one guarded reference. `swap` replaces the reference
/// in a single step; a prediction already running keeps the `Arc` it cloned,
/// so it never sees a half-replaced model.
#[derive(Debug)]
pub struct InferenceEngine {
    model: RwLock<Arc<Model>>,
}

impl InferenceEngine {
    pub fn new(model: Model) -> Self {
        Self {
            model: RwLock::new(Arc::new(model)),
        }
    }

    /// Load the model artifact at `path`.
    pub fn from_path(path: &Path) -> Result<Self, MlError> {
        let model = Model::load(path)?;
        tracing::info!("Loaded model {:?} from {}", model.shape(), path.display());
        Ok(Self::new(model))
    }

    /// Snapshot of the active model.
    pub fn model(&self) -> Arc<Model> {
        let guard = self.model.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Raw model output in degrees.
    ///
    /// Usually inside `[0,180]` but not guaranteed; use
    /// [`predict_clamped`](Self::predict_clamped) before driving hardware.
    pub fn predict(&self, state: &RiderState) -> f32 {
        self.model().predict(&state.to_input())
    }

    /// Prediction clamped into the servo range.
    pub fn predict_clamped(&self, state: &RiderState) -> f32 {
        clamp_angle(self.predict(state))
    }

    /// Install `model` as the active model, returning the previous one.
    pub fn swap(&self, model: Model) -> Arc<Model> {
        let mut guard = self.model.write().unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *guard, Arc::new(model));
        tracing::info!("Swapped active model");
        previous
    }
}
