//! Access-token persistence and expiry.
//!
//! A token set is obtained out-of-band by the one-time authorization flow and
//! then kept fresh by refresh (see `auth`). This module owns the on-disk shape,
//! the store seam, and the expiry rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::local_files::{FileSystem, LocalFs};

/// One OAuth token set. Field names follow the token endpoint's wire format so
/// the persisted file and the refresh response share a shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Lifetime in seconds, as reported by the token endpoint.
    pub expires_in: i64,
    /// Stamped the moment the set was received; never recomputed.
    pub acquired: DateTime<Utc>,
}

/// Time source seam so expiry is testable without sleeping.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whether `tokens` should be refreshed before use.
///
/// The early-expiry buffer shrinks the usable lifetime, clamped so a buffer
/// larger than the lifetime leaves the token valid for exactly `expires_in`
/// seconds. The boundary counts as expired: a token at the exact edge is
/// unusable by the time any request carrying it lands.
pub fn is_expired(tokens: &AccessTokenSet, early_expiry_secs: u64, now: DateTime<Utc>) -> bool {
    let early = early_expiry_secs as i64;
    let effective = if early > tokens.expires_in {
        tokens.expires_in
    } else {
        tokens.expires_in - early
    };

    tokens.acquired + Duration::seconds(effective) <= now
}

/// Persistence seam for the token set.
pub trait TokenStore {
    /// Returns `None` when the application has never been authorized.
    fn tokens(&self) -> Result<Option<AccessTokenSet>>;

    fn save_tokens(&self, tokens: &AccessTokenSet) -> Result<()>;
}

/// Token store backed by a JSON file (default `~/.config/conveyor/tokens.json`).
pub struct JsonFileTokenStore<F: FileSystem = LocalFs> {
    fs: F,
    path: PathBuf,
}

impl JsonFileTokenStore<LocalFs> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            fs: LocalFs::new(),
            path,
        }
    }

    /// Store at the default location (`~/.config/conveyor/tokens.json`).
    pub fn at_default_path() -> crate::Result<Self> {
        Ok(Self::new(crate::paths::tokens_json()?))
    }
}

impl<F: FileSystem> JsonFileTokenStore<F> {
    pub fn with_fs(fs: F, path: PathBuf) -> Self {
        Self { fs, path }
    }
}

impl<F: FileSystem> TokenStore for JsonFileTokenStore<F> {
    fn tokens(&self) -> Result<Option<AccessTokenSet>> {
        if !self.fs.exists(&self.path) {
            return Ok(None);
        }

        let content = self.fs.read(&self.path)?;
        let tokens = serde_json::from_str(&content).map_err(|e| {
            crate::Error::internal_json(e.to_string(), Some("parse token file".to_string()))
        })?;

        Ok(Some(tokens))
    }

    fn save_tokens(&self, tokens: &AccessTokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            self.fs.ensure_dir(parent)?;
        }

        let content = serde_json::to_string_pretty(tokens).map_err(|e| {
            crate::Error::internal_json(e.to_string(), Some("serialize tokens".to_string()))
        })?;

        self.fs.write(&self.path, &content)
    }
}
