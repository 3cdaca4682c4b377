//! Configuration module for OpenSerp-RS
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Environment variable naming an explicit settings file
pub const SETTINGS_PATH_VAR: &str = "OPENSERP_SETTINGS_PATH";

/// Load settings from the first file found, or use defaults
///
/// Looks at `$OPENSERP_SETTINGS_PATH`, then `openserp.yml` and
/// `config/openserp.yml` in the working directory. Environment overrides
/// are applied on top in every case.
pub fn load() -> Result<Settings> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var(SETTINGS_PATH_VAR) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from("openserp.yml"));
    candidates.push(PathBuf::from("config/openserp.yml"));

    let mut settings = match candidates.iter().find(|p| p.exists()) {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };

    settings.merge_env();
    Ok(settings)
}
