//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Everything lives under ~/.research-desk/.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Research Desk directory (~/.research-desk/)
pub fn research_desk_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".research-desk"))
}

/// Get the config file path (~/.research-desk/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(research_desk_dir()?.join("config.json"))
}

/// Get the default snapshot directory (~/.research-desk/data/)
pub fn data_dir() -> AppResult<PathBuf> {
    Ok(research_desk_dir()?.join("data"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Research Desk directory, creating if it doesn't exist
pub fn ensure_research_desk_dir() -> AppResult<PathBuf> {
    let path = research_desk_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
