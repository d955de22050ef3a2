//! Application configuration.
//!
//! Loaded from TOML; every section falls back to defaults so a partial file
//! (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ml::calibration::DEFAULT_REST_HR;
use crate::ml::dataset::DEFAULT_FEEDBACK_WEIGHT;
use crate::ml::synthetic::{SyntheticConfig, DEFAULT_HIIT_MULTIPLIER, DEFAULT_RESISTANCE_CONSTANT};
use crate::ml::trainer::TrainerConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Resolved data directory
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// File locations
    pub paths: PathSettings,
    /// Physiological calibration
    pub calibration: CalibrationSettings,
    /// Synthetic label generation
    pub synthetic: SyntheticSettings,
    /// Regressor training
    pub training: TrainingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            paths: PathSettings::default(),
            calibration: CalibrationSettings::default(),
            synthetic: SyntheticSettings::default(),
            training: TrainingSettings::default(),
        }
    }
}

/// File locations. Relative paths resolve against the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Running activity stream CSV
    pub run_csv: PathBuf,
    /// Cycling activity stream CSV
    pub ride_csv: PathBuf,
    /// Feedback log CSV
    pub feedback_log: PathBuf,
    /// Drift history JSON
    pub drift_log: PathBuf,
    /// Serialized model artifact
    pub model_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            run_csv: PathBuf::from("running_time_series.csv"),
            ride_csv: PathBuf::from("biking_time_series.csv"),
            feedback_log: PathBuf::from("feedback_log.csv"),
            drift_log: PathBuf::from("angle_history.json"),
            model_file: PathBuf::from("bike_prediction_model.bin"),
        }
    }
}

/// Calibration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Resting heart rate in bpm
    pub rest_hr: f32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            rest_hr: DEFAULT_REST_HR,
        }
    }
}

/// Synthetic label settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    /// Examples generated per (re)train
    pub sample_count: usize,
    /// HIIT power multiplier
    pub hiit_multiplier: f32,
    /// Watts per m/s to servo degrees
    pub resistance_constant: f32,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            sample_count: 20_000,
            hiit_multiplier: DEFAULT_HIIT_MULTIPLIER,
            resistance_constant: DEFAULT_RESISTANCE_CONSTANT,
        }
    }
}

impl SyntheticSettings {
    pub fn generator_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            hiit_multiplier: self.hiit_multiplier,
            resistance_constant: self.resistance_constant,
        }
    }
}

/// Training settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Copies of each feedback example in the training set
    pub feedback_weight: usize,
    /// Fixed RNG seed; entropy when unset
    pub seed: Option<u64>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let trainer = TrainerConfig::default();
        Self {
            hidden_layers: trainer.hidden_layers,
            epochs: trainer.epochs,
            batch_size: trainer.batch_size,
            learning_rate: trainer.learning_rate,
            feedback_weight: DEFAULT_FEEDBACK_WEIGHT,
            seed: None,
        }
    }
}

impl AppConfig {
    /// Resolve a configured path against the data directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn run_csv_path(&self) -> PathBuf {
        self.resolve(&self.paths.run_csv)
    }

    pub fn ride_csv_path(&self) -> PathBuf {
        self.resolve(&self.paths.ride_csv)
    }

    pub fn feedback_log_path(&self) -> PathBuf {
        self.resolve(&self.paths.feedback_log)
    }

    pub fn drift_log_path(&self) -> PathBuf {
        self.resolve(&self.paths.drift_log)
    }

    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.paths.model_file)
    }

    /// Trainer hyperparameters and seed.
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            hidden_layers: self.training.hidden_layers.clone(),
            epochs: self.training.epochs,
            batch_size: self.training.batch_size,
            learning_rate: self.training.learning_rate,
            synthetic_count: self.synthetic.sample_count,
            feedback_weight: self.training.feedback_weight,
            synthetic: self.synthetic.generator_config(),
            seed: self.training.seed,
        }
    }

    /// Reject values training cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.calibration.rest_hr > 0.0) {
            return Err(ConfigError::InvalidValue(
                "calibration.rest_hr must be positive".into(),
            ));
        }
        if self.synthetic.sample_count == 0 {
            return Err(ConfigError::InvalidValue(
                "synthetic.sample_count must be at least 1".into(),
            ));
        }
        if !(self.synthetic.hiit_multiplier > 0.0) || !(self.synthetic.resistance_constant > 0.0) {
            return Err(ConfigError::InvalidValue(
                "synthetic.hiit_multiplier and synthetic.resistance_constant must be positive"
                    .into(),
            ));
        }
        if self.training.hidden_layers.is_empty() || self.training.hidden_layers.contains(&0) {
            return Err(ConfigError::InvalidValue(
                "training.hidden_layers needs at least one non-zero width".into(),
            ));
        }
        if self.training.epochs == 0 || self.training.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "training.epochs and training.batch_size must be at least 1".into(),
            ));
        }
        if !(self.training.learning_rate > 0.0) {
            return Err(ConfigError::InvalidValue(
                "training.learning_rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "smartbike", "SmartBike")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "smartbike", "SmartBike")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load configuration from `path`, or the default location when `None`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

    let mut config = if path.exists() {
        let content =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        parse_config(&content)?
    } else {
        tracing::info!("No config at {}, using defaults", path.display());
        AppConfig::default()
    };

    config.data_dir = config.paths.data_dir.clone().unwrap_or_else(get_data_dir);
    config.validate()?;

    Ok(config)
}

/// Parse configuration TOML.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save configuration to file.
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    super::write_atomic(path, content.as_bytes()).map_err(|e| ConfigError::IoError(e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration.rest_hr, 60.0);
        assert_eq!(config.synthetic.sample_count, 20_000);
        assert_eq!(config.training.feedback_weight, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = parse_config(
            r#"
            [synthetic]
            hiit_multiplier = 1.2

            [training]
            feedback_weight = 3
            seed = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.synthetic.hiit_multiplier, 1.2);
        assert_eq!(config.synthetic.resistance_constant, 2.2);
        assert_eq!(config.training.feedback_weight, 3);
        assert_eq!(config.training.seed, Some(42));
        assert_eq!(config.training.epochs, 15);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.training.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.hidden_layers = vec![];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.calibration.rest_hr = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_data_dir() {
        let mut config = AppConfig::default();
        config.data_dir = PathBuf::from("/var/bike");
        config.paths.drift_log = PathBuf::from("/tmp/drift.json");

        assert_eq!(config.feedback_log_path(), PathBuf::from("/var/bike/feedback_log.csv"));
        assert_eq!(config.drift_log_path(), PathBuf::from("/tmp/drift.json"));
    }

    #[test]
    fn test_load_with_data_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("[paths]\ndata_dir = {:?}\n", dir.path().to_string_lossy()),
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.model_path(), dir.path().join("bike_prediction_model.bin"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.training.feedback_weight = 3;
        config.synthetic.sample_count = 500;

        save_config(&config, &path).unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.training.feedback_weight, 3);
        assert_eq!(loaded.synthetic.sample_count, 500);
    }

    #[test]
    fn test_trainer_config_mapping() {
        let mut config = AppConfig::default();
        config.training.seed = Some(9);
        config.synthetic.hiit_multiplier = 1.2;

        let trainer = config.trainer_config();
        assert_eq!(trainer.seed, Some(9));
        assert_eq!(trainer.synthetic.hiit_multiplier, 1.2);
        assert_eq!(trainer.synthetic_count, 20_000);
    }
}
