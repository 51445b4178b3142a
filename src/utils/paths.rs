//! Cross-Platform Path Utilities
//!
//! Resolves the Panel Review settings location (`~/.panel-review/`).

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Panel Review directory (~/.panel-review/)
pub fn panel_review_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".panel-review"))
}

/// Get the settings file path (~/.panel-review/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(panel_review_dir()?.join("config.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
