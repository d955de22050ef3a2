//! Storage for logs, model artifacts and configuration.

pub mod config;
pub mod drift_log;
pub mod feedback_store;

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ml::types::MlError;

pub use config::{AppConfig, ConfigError};
pub use drift_log::{AngleDifferenceRecord, DriftTracker};
pub use feedback_store::{FeedbackRecord, FeedbackStore};

/// Replace a file's content without exposing a partial write.
///
/// Data goes to `<path>.tmp`, is synced, then renamed over `path`. If any
/// step fails the original file is left untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), MlError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let staged = std::fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(e) = staged {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            tracing::warn!("Could not remove {}: {}", tmp.display(), cleanup);
        }
        return Err(MlError::PersistenceError(format!(
            "{}: {}",
            tmp.display(),
            e
        )));
    }

    std::fs::rename(&tmp, path).map_err(|e| {
        MlError::PersistenceError(format!("{}: {}", path.display(), e))
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
