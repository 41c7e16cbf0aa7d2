//! OAuth token lifecycle.
//!
//! Produces a currently-valid access token on demand, refreshing lazily
//! through the configured token endpoint. The initial authorization is a
//! one-time human step: when no tokens are persisted the error carries the
//! authorization URL the user must visit, and nothing here retries it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::token::{is_expired, AccessTokenSet, Clock, JsonFileTokenStore, TokenStore};

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const AUTHORIZE_RESPONSE_TYPE: &str = "Assertion";

/// Seam the resolver and client authenticate through.
pub trait Authenticator {
    /// Returns a currently-valid access token, refreshing first if needed.
    fn authenticate(&self) -> Result<String>;
}

/// Transport seam for the refresh POST. Returns the raw response body.
pub trait RefreshTransport {
    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<String>;
}

/// Blocking HTTP transport for the token endpoint.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshTransport for HttpTransport {
    fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::api_unexpected_response(url, status.as_u16(), body));
        }

        Ok(body)
    }
}

/// The authorize-endpoint URL a human must visit to grant (or re-grant) the
/// application access. Everything is templated from configuration; nothing is
/// computed beyond encoding the space-joined scope list.
pub fn authorization_url(config: &PipelineConfig) -> String {
    format!(
        "{}?client_id={}&response_type={}&state={}&scope={}&redirect_uri={}",
        config.authorize_url,
        config.client_id,
        AUTHORIZE_RESPONSE_TYPE,
        config.user_id,
        urlencoding::encode(&config.scopes.join(" ")),
        config.callback_url,
    )
}

/// Token endpoint response. `acquired` is ours, stamped on receipt.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: String,
    expires_in: i64,
}

/// Lazily-refreshing authenticator over a persisted token set.
pub struct OAuthAuthenticator<S: TokenStore, T: RefreshTransport, C: Clock> {
    config: PipelineConfig,
    store: S,
    transport: T,
    clock: C,
}

impl<S: TokenStore, T: RefreshTransport, C: Clock> OAuthAuthenticator<S, T, C> {
    pub fn new(config: PipelineConfig, store: S, transport: T, clock: C) -> Self {
        Self {
            config,
            store,
            transport,
            clock,
        }
    }

    /// The authorize-endpoint URL a human must visit when no tokens exist.
    pub fn authorization_url(&self) -> String {
        authorization_url(&self.config)
    }

    fn refresh(&self, current: &AccessTokenSet) -> Result<AccessTokenSet> {
        let form: [(&str, String); 5] = [
            ("client_assertion_type", CLIENT_ASSERTION_TYPE.to_string()),
            ("client_assertion", self.config.client_secret.clone()),
            ("grant_type", "refresh_token".to_string()),
            ("assertion", current.refresh_token.clone()),
            ("redirect_uri", self.config.callback_url.clone()),
        ];

        let body = self
            .transport
            .post_form(&self.config.token_url, &form)
            .map_err(|e| Error::auth_refresh_failed(e.to_string()))?;

        let response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::auth_refresh_failed(format!("invalid token response: {}", e)))?;

        Ok(AccessTokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            acquired: self.clock.now(),
        })
    }
}

impl<S: TokenStore, T: RefreshTransport, C: Clock> Authenticator for OAuthAuthenticator<S, T, C> {
    fn authenticate(&self) -> Result<String> {
        let tokens = self
            .store
            .tokens()?
            .ok_or_else(|| Error::auth_no_tokens(self.authorization_url()))?;

        if !is_expired(&tokens, self.config.token_early_expiry_secs, self.clock.now()) {
            return Ok(tokens.access_token);
        }

        log_status!("auth", "access token expired, refreshing");

        let refreshed = self.refresh(&tokens)?;
        self.store.save_tokens(&refreshed)?;

        Ok(refreshed.access_token)
    }
}

/// Authorization state of the persisted token set, for `conveyor auth status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired: Option<DateTime<Utc>>,
}

/// Inspect the default token store against the default config.
pub fn status() -> Result<AuthStatus> {
    let config = PipelineConfig::load_default()?;
    let store = JsonFileTokenStore::at_default_path()?;

    Ok(match store.tokens()? {
        None => AuthStatus {
            authorized: false,
            expired: None,
            acquired: None,
        },
        Some(tokens) => AuthStatus {
            authorized: true,
            expired: Some(is_expired(
                &tokens,
                config.token_early_expiry_secs,
                Utc::now(),
            )),
            acquired: Some(tokens.acquired),
        },
    })
}
