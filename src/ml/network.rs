//! Feed-forward regressor and its serialized artifact.
//!
//! A small dense network built from `candle_nn::Linear` layers (ReLU hidden
//! layers, linear output). Inputs are standardized with statistics captured at
//! training time and the output is scaled back to servo degrees, so the
//! artifact maps raw `[heartrate, speed, time_offset, mode]` straight to an
//! angle.

use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::types::{MlError, TrainingExample, FEATURE_COUNT, MAX_ANGLE};
use crate::storage::write_atomic;

/// Magic prefix of the model artifact.
const ARTIFACT_MAGIC: &[u8; 4] = b"SBM1";

/// Per-feature standardization captured from the training set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct Standardizer {
    mean: [f32; FEATURE_COUNT],
    std: [f32; FEATURE_COUNT],
}

impl Standardizer {
    pub(crate) fn fit(examples: &[TrainingExample]) -> Self {
        let n = examples.len().max(1) as f64;
        let mut mean = [0.0_f64; FEATURE_COUNT];
        for ex in examples {
            for (m, x) in mean.iter_mut().zip(ex.state.to_input()) {
                *m += x as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = [0.0_f64; FEATURE_COUNT];
        for ex in examples {
            for ((v, m), x) in var.iter_mut().zip(&mean).zip(ex.state.to_input()) {
                *v += (x as f64 - m).powi(2);
            }
        }

        let mut out = Self {
            mean: [0.0; FEATURE_COUNT],
            std: [1.0; FEATURE_COUNT],
        };
        for i in 0..FEATURE_COUNT {
            out.mean[i] = mean[i] as f32;
            let std = (var[i] / n).sqrt() as f32;
            // Constant features pass through centred but unscaled.
            out.std[i] = if std > 1e-6 { std } else { 1.0 };
        }
        out
    }

    pub(crate) fn apply(&self, input: &[f32; FEATURE_COUNT]) -> [f32; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (input[i] - self.mean[i]) / self.std[i];
        }
        out
    }
}

/// Weights of one dense layer, row-major `[outputs][inputs]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LayerParams {
    pub(crate) inputs: usize,
    pub(crate) outputs: usize,
    pub(crate) weights: Vec<f32>,
    pub(crate) biases: Vec<f32>,
}

impl LayerParams {
    /// He-uniform initialized layer.
    fn initialize<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = (6.0 / inputs as f32).sqrt();
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs)
                .map(|_| rng.gen_range(-bound..bound))
                .collect(),
            biases: vec![0.0; outputs],
        }
    }

    /// Copy the current values out of a candle layer.
    pub(crate) fn from_linear(layer: &Linear) -> Result<Self, MlError> {
        let (outputs, inputs) = layer.weight().dims2()?;
        let weights = layer.weight().flatten_all()?.to_vec1::<f32>()?;
        let biases = match layer.bias() {
            Some(bias) => bias.to_vec1::<f32>()?,
            None => vec![0.0; outputs],
        };
        Ok(Self {
            inputs,
            outputs,
            weights,
            biases,
        })
    }

    pub(crate) fn weight_tensor(&self, device: &Device) -> Result<Tensor, MlError> {
        Ok(Tensor::from_slice(
            self.weights.as_slice(),
            (self.outputs, self.inputs),
            device,
        )?)
    }

    pub(crate) fn bias_tensor(&self, device: &Device) -> Result<Tensor, MlError> {
        Ok(Tensor::from_slice(self.biases.as_slice(), self.outputs, device)?)
    }
}

/// Serializable content of a [`Model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ModelParams {
    pub(crate) standardizer: Standardizer,
    pub(crate) layers: Vec<LayerParams>,
}

impl ModelParams {
    /// Random starting point with the given hidden widths.
    pub(crate) fn initialize<R: Rng>(
        hidden_layers: &[usize],
        standardizer: Standardizer,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden_layers.len() + 1);
        let mut inputs = FEATURE_COUNT;
        for &width in hidden_layers {
            layers.push(LayerParams::initialize(inputs, width, rng));
            inputs = width;
        }
        layers.push(LayerParams::initialize(inputs, 1, rng));
        Self {
            standardizer,
            layers,
        }
    }

    fn check_shapes(&self) -> Result<(), MlError> {
        let mut inputs = FEATURE_COUNT;
        for layer in &self.layers {
            if layer.inputs != inputs
                || layer.weights.len() != layer.inputs * layer.outputs
                || layer.biases.len() != layer.outputs
            {
                return Err(MlError::SerializationError(
                    "model layer shapes are inconsistent".into(),
                ));
            }
            inputs = layer.outputs;
        }
        if inputs != 1 {
            return Err(MlError::SerializationError(
                "model must produce a single output".into(),
            ));
        }
        Ok(())
    }
}

/// Run `xs` of shape `[n, 4]` (already standardized) through the layers.
pub(crate) fn forward(layers: &[Linear], xs: &Tensor) -> candle_core::Result<Tensor> {
    let last = layers.len().saturating_sub(1);
    let mut x = xs.clone();
    for (i, layer) in layers.iter().enumerate() {
        x = layer.forward(&x)?;
        if i != last {
            x = x.relu()?;
        }
    }
    Ok(x)
}

/// Trained regressor from rider state to servo angle.
///
/// Immutable once built; retraining produces a new `Model`.
#[derive(Debug, Clone)]
pub struct Model {
    params: ModelParams,
    layers: Vec<Linear>,
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl Model {
    /// Build the candle layers for a set of weights.
    pub(crate) fn from_params(params: ModelParams) -> Result<Self, MlError> {
        params.check_shapes()?;
        let device = Device::Cpu;
        let layers = params
            .layers
            .iter()
            .map(|p| -> Result<Linear, MlError> {
                Ok(Linear::new(p.weight_tensor(&device)?, Some(p.bias_tensor(&device)?)))
            })
            .collect::<Result<Vec<_>, MlError>>()?;
        Ok(Self { params, layers })
    }

    /// Randomly initialized network with the given hidden widths.
    #[cfg(test)]
    pub(crate) fn initialize<R: Rng>(
        hidden_layers: &[usize],
        standardizer: Standardizer,
        rng: &mut R,
    ) -> Result<Self, MlError> {
        Self::from_params(ModelParams::initialize(hidden_layers, standardizer, rng))
    }

    /// Predicted angle in degrees for raw features.
    pub fn try_predict(&self, input: &[f32; FEATURE_COUNT]) -> Result<f32, MlError> {
        let standardized = self.params.standardizer.apply(input);
        let xs = Tensor::from_slice(standardized.as_slice(), (1, FEATURE_COUNT), &Device::Cpu)?;
        let out = forward(&self.layers, &xs)?.flatten_all()?.to_vec1::<f32>()?;
        let scaled = out.first().copied().ok_or_else(|| {
            MlError::ModelError("network produced no output".into())
        })?;
        Ok(scaled * MAX_ANGLE)
    }

    /// Predicted angle in degrees for raw features.
    ///
    /// Not clamped; the network is trained on `[0,180]` labels but may stray.
    /// A tensor failure is logged and yields NaN, which [`clamp_angle`]
    /// maps to the lowest angle.
    ///
    /// [`clamp_angle`]: super::types::clamp_angle
    pub fn predict(&self, input: &[f32; FEATURE_COUNT]) -> f32 {
        self.try_predict(input).unwrap_or_else(|e| {
            tracing::error!("Prediction failed: {}", e);
            f32::NAN
        })
    }

    /// Batch-of-one tensor interface: `[1,4]` in, `[1,1]` out.
    pub fn run(&self, input: &[[f32; FEATURE_COUNT]; 1]) -> [[f32; 1]; 1] {
        [[self.predict(&input[0])]]
    }

    /// Layer widths including input and output.
    pub fn shape(&self) -> Vec<usize> {
        std::iter::once(FEATURE_COUNT)
            .chain(self.params.layers.iter().map(|l| l.outputs))
            .collect()
    }

    /// Serialize to the artifact byte format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MlError> {
        let mut bytes = ARTIFACT_MAGIC.to_vec();
        bytes.extend(bincode::serialize(&self.params)?);
        Ok(bytes)
    }

    /// Deserialize from the artifact byte format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MlError> {
        let payload = bytes
            .strip_prefix(ARTIFACT_MAGIC.as_slice())
            .ok_or_else(|| MlError::SerializationError("not a model artifact".into()))?;
        let params: ModelParams = bincode::deserialize(payload)?;
        Self::from_params(params)
    }

    /// Write the artifact without exposing a partially written file.
    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        write_atomic(path, &self.to_bytes()?)?;
        tracing::info!("Saved model {:?} to {}", self.shape(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, MlError> {
        let bytes = std::fs::read(path)
            .map_err(|e| MlError::PersistenceError(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes)
    }
}
