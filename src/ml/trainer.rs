//! Regressor training and feedback-weighted retraining.
//!
//! `fit` runs mini-batch Adam (`candle_nn::AdamW` without weight decay) on
//! mean squared error. `retrain` regenerates the synthetic set, merges the
//! weighted feedback log and fits a fresh model. Synthetic data is redrawn
//! every time, so consecutive retrains on the same feedback give similar but
//! not identical models.

use candle_core::{Device, Tensor, Var};
use candle_nn::{AdamW, Linear, Optimizer, ParamsAdamW};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::calibration::{CalibrationEstimator, CalibrationProfile};
use super::dataset;
use super::network::{self, LayerParams, Model, ModelParams, Standardizer};
use super::synthetic::{SyntheticConfig, SyntheticLabelGenerator};
use super::types::{MlError, TrainingExample, FEATURE_COUNT, MAX_ANGLE};
use crate::activity::ActivityStreams;
use crate::storage::feedback_store::FeedbackStore;

/// Fixed training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Synthetic examples per retrain
    pub synthetic_count: usize,
    /// Copies of each feedback example
    pub feedback_weight: usize,
    /// Labelling formula constants
    pub synthetic: SyntheticConfig,
    /// RNG seed; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![32, 16],
            epochs: 15,
            batch_size: 32,
            learning_rate: 1e-3,
            synthetic_count: 20_000,
            feedback_weight: dataset::DEFAULT_FEEDBACK_WEIGHT,
            synthetic: SyntheticConfig::default(),
            seed: None,
        }
    }
}

/// Trainable copy of a network: optimizer variables plus layers reading them.
struct TrainableNetwork {
    vars: Vec<Var>,
    layers: Vec<Linear>,
}

impl TrainableNetwork {
    fn new(params: &ModelParams, device: &Device) -> Result<Self, MlError> {
        let mut vars = Vec::with_capacity(params.layers.len() * 2);
        let mut layers = Vec::with_capacity(params.layers.len());
        for layer in &params.layers {
            let weight = Var::from_tensor(&layer.weight_tensor(device)?)?;
            let bias = Var::from_tensor(&layer.bias_tensor(device)?)?;
            layers.push(Linear::new(
                weight.as_tensor().clone(),
                Some(bias.as_tensor().clone()),
            ));
            vars.push(weight);
            vars.push(bias);
        }
        Ok(Self { vars, layers })
    }

    fn snapshot(&self, standardizer: Standardizer) -> Result<ModelParams, MlError> {
        let layers = self
            .layers
            .iter()
            .map(LayerParams::from_linear)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ModelParams {
            standardizer,
            layers,
        })
    }
}

/// Fits regressors and composes the retraining pipeline.
pub struct Trainer {
    config: TrainerConfig,
    generator: SyntheticLabelGenerator,
    rng: ChaCha8Rng,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            generator: SyntheticLabelGenerator::new(config.synthetic),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit a fresh model to `examples`.
    ///
    /// Only an empty training set fails.
    pub fn fit(&mut self, examples: &[TrainingExample]) -> Result<Model, MlError> {
        if examples.is_empty() {
            return Err(MlError::InsufficientData {
                message: "Training set is empty".into(),
                guidance: "Generate synthetic samples or record feedback before training.".into(),
            });
        }

        let device = Device::Cpu;
        let standardizer = Standardizer::fit(examples);
        let inputs: Vec<[f32; FEATURE_COUNT]> = examples
            .iter()
            .map(|ex| standardizer.apply(&ex.state.to_input()))
            .collect();
        let targets: Vec<f32> = examples.iter().map(|ex| ex.target_angle / MAX_ANGLE).collect();

        let initial = ModelParams::initialize(&self.config.hidden_layers, standardizer, &mut self.rng);
        let trainable = TrainableNetwork::new(&initial, &device)?;
        let mut optimizer = AdamW::new(
            trainable.vars.clone(),
            ParamsAdamW {
                lr: self.config.learning_rate as f64,
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-7,
                weight_decay: 0.0,
            },
        )?;

        let mut order: Vec<usize> = (0..examples.len()).collect();
        let batch_size = self.config.batch_size.max(1);
        let mut batch_inputs = Vec::with_capacity(batch_size * FEATURE_COUNT);
        let mut batch_targets = Vec::with_capacity(batch_size);

        let mut epoch_loss = 0.0;
        for epoch in 0..self.config.epochs {
            order.shuffle(&mut self.rng);
            let mut loss_sum = 0.0_f64;

            for batch in order.chunks(batch_size) {
                batch_inputs.clear();
                batch_targets.clear();
                for &idx in batch {
                    batch_inputs.extend_from_slice(&inputs[idx]);
                    batch_targets.push(targets[idx]);
                }

                let xs = Tensor::from_slice(batch_inputs.as_slice(), (batch.len(), FEATURE_COUNT), &device)?;
                let ys = Tensor::from_slice(batch_targets.as_slice(), (batch.len(), 1), &device)?;
                let predictions = network::forward(&trainable.layers, &xs)?;
                let loss = candle_nn::loss::mse(&predictions, &ys)?;
                optimizer.backward_step(&loss)?;

                loss_sum += loss.to_scalar::<f32>()? as f64 * batch.len() as f64;
            }

            // Reported in squared degrees.
            epoch_loss = loss_sum / examples.len() as f64 * (MAX_ANGLE as f64).powi(2);
            tracing::debug!("Epoch {}/{}: mse {:.3}", epoch + 1, self.config.epochs, epoch_loss);
        }

        let model = Model::from_params(trainable.snapshot(standardizer)?)?;
        tracing::info!(
            "Fitted model {:?} on {} examples, final mse {:.3}",
            model.shape(),
            examples.len(),
            epoch_loss
        );
        Ok(model)
    }

    /// Regenerate synthetic labels, merge weighted feedback and fit.
    pub fn retrain(
        &mut self,
        calibration: &CalibrationProfile,
        synthetic_count: usize,
        feedback: &FeedbackStore,
        weight: usize,
    ) -> Result<Model, MlError> {
        let synthetic = self
            .generator
            .generate(calibration, synthetic_count, &mut self.rng);
        let combined = dataset::combine(&synthetic, feedback.load_all(), weight);

        tracing::info!(
            "Retraining on {} synthetic + {} feedback x{} examples",
            synthetic.len(),
            feedback.len(),
            weight
        );
        self.fit(&combined)
    }

    /// Retrain using the configured synthetic count and feedback weight.
    pub fn retrain_default(
        &mut self,
        calibration: &CalibrationProfile,
        feedback: &FeedbackStore,
    ) -> Result<Model, MlError> {
        let (count, weight) = (self.config.synthetic_count, self.config.feedback_weight);
        self.retrain(calibration, count, feedback, weight)
    }

    /// Calibrate from activity streams, then train.
    pub fn train_from_activities(
        &mut self,
        estimator: &CalibrationEstimator,
        streams: &ActivityStreams,
        feedback: &FeedbackStore,
    ) -> Result<(CalibrationProfile, Model), MlError> {
        let calibration = estimator.estimate(&streams.run, &streams.ride)?;
        let model = self.retrain_default(&calibration, feedback)?;
        Ok((calibration, model))
    }
}
