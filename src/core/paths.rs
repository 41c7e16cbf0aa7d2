use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

const ENV_VAR_HOME_OVERRIDE: &str = "CONVEYOR_HOME";

/// Base conveyor config directory (universal ~/.config/conveyor/ on all platforms).
///
/// Override with the `CONVEYOR_HOME` environment variable (used by tests and CI).
pub fn conveyor() -> Result<PathBuf> {
    if let Ok(overridden) = env::var(ENV_VAR_HOME_OVERRIDE) {
        return Ok(PathBuf::from(overridden));
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows")
        })?;
        Ok(PathBuf::from(appdata).join("conveyor"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected("HOME environment variable not set on Unix-like system")
        })?;
        Ok(PathBuf::from(home).join(".config").join("conveyor"))
    }
}

/// Global config.json file path
pub fn config_json() -> Result<PathBuf> {
    Ok(conveyor()?.join("config.json"))
}

/// Persisted OAuth token file path
pub fn tokens_json() -> Result<PathBuf> {
    Ok(conveyor()?.join("tokens.json"))
}
