//! Pipeline service configuration.
//!
//! Loaded from `~/.config/conveyor/config.json` (see `paths`). All values are
//! templated into requests as-is; conveyor computes nothing from them beyond
//! URL assembly.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::local_files::FileSystem;

fn default_status_check_interval() -> u64 {
    5
}

fn default_token_early_expiry() -> u64 {
    60
}

/// Connection and OAuth settings for the release-management service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Service API root, e.g. `https://pipelines.example.com/api`
    pub base_url: String,

    /// Project scope all release/build lookups run under
    pub project: String,

    /// OAuth token endpoint used for refresh
    pub token_url: String,

    /// OAuth authorize endpoint shown to the user when no tokens exist
    pub authorize_url: String,

    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,

    /// Sent as the OAuth `state` value
    pub user_id: String,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Buffer (seconds) subtracted from the token lifetime so a token is
    /// refreshed shortly before the service would reject it.
    #[serde(default = "default_token_early_expiry")]
    pub token_early_expiry_secs: u64,

    /// Sleep between deployment status polls, in seconds.
    #[serde(default = "default_status_check_interval")]
    pub status_check_interval_secs: u64,

    /// Branch used when a deployment request does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

impl PipelineConfig {
    /// Read the config from its default location (`~/.config/conveyor/config.json`).
    pub fn load_default() -> Result<Self> {
        let path = crate::paths::config_json()?;
        Self::load(&crate::local_files::LocalFs::new(), &path)
    }

    /// Read and validate the config file at `path`.
    pub fn load<F: FileSystem>(fs: &F, path: &Path) -> Result<Self> {
        if !fs.exists(path) {
            return Err(Error::config_not_found(path.display().to_string()));
        }

        let content = fs.read(path)?;
        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            Error::new(
                crate::ErrorCode::ConfigInvalidJson,
                "Invalid configuration file",
                serde_json::json!({
                    "path": path.display().to_string(),
                    "error": e.to_string(),
                }),
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("baseUrl", &self.base_url),
            ("project", &self.project),
            ("tokenUrl", &self.token_url),
            ("authorizeUrl", &self.authorize_url),
            ("clientId", &self.client_id),
            ("callbackUrl", &self.callback_url),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config_invalid_value(key, "value cannot be empty"));
            }
        }

        Ok(())
    }
}

/// Run-scoped behavior switches, set from CLI flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Resolve and report without triggering anything.
    pub what_if: bool,
    /// Accept partially-succeeded prerequisite environments as deployable.
    pub allow_partial: bool,
}
