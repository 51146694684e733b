//! Cross-Platform Path Utilities
//!
//! Functions for resolving the engine's data directories.
//! The file-backed storage defaults to ~/.diligence/.

use std::path::PathBuf;

use crate::utils::error::{EngineError, EngineResult};

/// Get the user's home directory
pub fn home_dir() -> EngineResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| EngineError::config("Could not determine home directory"))
}

/// Get the diligence data directory (~/.diligence/)
pub fn diligence_dir() -> EngineResult<PathBuf> {
    Ok(home_dir()?.join(".diligence"))
}

/// Get the durable store directory (~/.diligence/store/)
pub fn store_dir() -> EngineResult<PathBuf> {
    Ok(diligence_dir()?.join("store"))
}

/// Get the engine config file path (~/.diligence/engine.json)
pub fn config_path() -> EngineResult<PathBuf> {
    Ok(diligence_dir()?.join("engine.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> EngineResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the durable store directory, creating it if it doesn't exist
pub fn ensure_store_dir() -> EngineResult<PathBuf> {
    let path = store_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
