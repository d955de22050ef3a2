//! SmartBike - servo resistance model trainer
//!
//! Main entry point: `train` builds the model from activity history,
//! `session` opens the interactive feedback loop.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use smartbike::activity::{ActivityStreamProvider, CsvActivityProvider};
use smartbike::ml::{CalibrationEstimator, CalibrationProfile, InferenceEngine, Trainer};
use smartbike::session::{default_scenarios, report, InteractiveSession};
use smartbike::storage::config::load_config;
use smartbike::storage::{AppConfig, DriftTracker, FeedbackStore};

#[derive(Parser)]
#[command(name = "smartbike", version, about = "Servo resistance model for a smart bike")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from activity history and save it
    Train,
    /// Evaluate the model interactively and collect feedback
    Session,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting SmartBike v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Train => train(&config),
        Commands::Session => session(&config),
    }
}

fn calibrate(config: &AppConfig) -> anyhow::Result<CalibrationProfile> {
    let provider = CsvActivityProvider::new(config.run_csv_path(), config.ride_csv_path());
    let streams = provider
        .load_streams()
        .context("loading activity streams")?;
    let estimator = CalibrationEstimator::new(config.calibration.rest_hr);
    estimator
        .estimate(&streams.run, &streams.ride)
        .context("calibrating heart rate to power")
}

fn train(config: &AppConfig) -> anyhow::Result<()> {
    let calibration = calibrate(config)?;
    let feedback = FeedbackStore::open(config.feedback_log_path())?;

    let mut trainer = Trainer::new(config.trainer_config());
    let model = trainer.retrain_default(&calibration, &feedback)?;
    let model_path = config.model_path();
    model
        .save(&model_path)
        .with_context(|| format!("saving model to {}", model_path.display()))?;

    let engine = InferenceEngine::new(model);
    print!("{}", report::render_scenario_table(&engine, &default_scenarios()));
    println!("Model written to {}", model_path.display());
    Ok(())
}

fn session(config: &AppConfig) -> anyhow::Result<()> {
    let calibration = calibrate(config)?;
    let feedback = FeedbackStore::open(config.feedback_log_path())?;
    let drift = DriftTracker::open(config.drift_log_path())?;
    let mut trainer = Trainer::new(config.trainer_config());

    let model_path = config.model_path();
    let engine = if model_path.exists() {
        InferenceEngine::from_path(&model_path)?
    } else {
        tracing::info!("No model at {}, training one", model_path.display());
        let model = trainer.retrain_default(&calibration, &feedback)?;
        model.save(&model_path)?;
        InferenceEngine::new(model)
    };

    let mut session = InteractiveSession::new(engine, trainer, calibration, feedback, drift)
        .with_model_path(model_path);

    let stdin = std::io::stdin();
    session
        .run(stdin.lock(), std::io::stdout())
        .context("reading commands")?;
    Ok(())
}
