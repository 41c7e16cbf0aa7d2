use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigNotFound,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    AuthNoTokens,
    AuthRefreshFailed,

    ManifestNotFound,
    ManifestInvalid,

    ApiRequestFailed,
    ApiUnexpectedResponse,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigNotFound => "config.not_found",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::AuthNoTokens => "auth.no_tokens",
            ErrorCode::AuthRefreshFailed => "auth.refresh_failed",

            ErrorCode::ManifestNotFound => "manifest.not_found",
            ErrorCode::ManifestInvalid => "manifest.invalid",

            ErrorCode::ApiRequestFailed => "api.request_failed",
            ErrorCode::ApiUnexpectedResponse => "api.unexpected_response",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoTokensDetails {
    pub authorization_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFailedDetails {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnexpectedResponseDetails {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn config_not_found(path: impl Into<String>) -> Self {
        let details = serde_json::json!({ "path": path.into() });
        Self::new(ErrorCode::ConfigNotFound, "Configuration not found", details)
            .with_hint("Create a config file with 'conveyor config init' or see the README")
    }

    pub fn config_invalid_value(key: impl Into<String>, problem: impl Into<String>) -> Self {
        let details = serde_json::json!({
            "key": key.into(),
            "problem": problem.into(),
        });
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    /// No persisted tokens: the application has never been authorized (or the
    /// token file was removed). Carries the authorization URL the user must
    /// visit to re-consent.
    pub fn auth_no_tokens(authorization_url: impl Into<String>) -> Self {
        let url = authorization_url.into();
        let details = serde_json::to_value(NoTokensDetails {
            authorization_url: url.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::AuthNoTokens,
            "Application has not been authorized",
            details,
        )
        .with_hint(format!("Visit the following URL to authorize: {}", url))
        .retryable(false)
    }

    pub fn auth_refresh_failed(cause: impl Into<String>) -> Self {
        let details = serde_json::json!({ "cause": cause.into() });
        Self::new(
            ErrorCode::AuthRefreshFailed,
            "Could not refresh access token",
            details,
        )
        .retryable(true)
    }

    pub fn manifest_not_found(path: impl Into<String>) -> Self {
        let details = serde_json::json!({ "path": path.into() });
        Self::new(ErrorCode::ManifestNotFound, "Manifest file not found", details)
    }

    pub fn manifest_invalid(problem: impl Into<String>) -> Self {
        let details = serde_json::json!({ "problem": problem.into() });
        Self::new(ErrorCode::ManifestInvalid, "Invalid manifest", details)
    }

    pub fn api_request_failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(RequestFailedDetails {
            url: url.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::ApiRequestFailed, "API request failed", details).retryable(true)
    }

    pub fn api_unexpected_response(
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        let details = serde_json::to_value(UnexpectedResponseDetails {
            url: url.into(),
            status,
            body: body.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ApiUnexpectedResponse,
            "Unexpected API response",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "context": context,
        });
        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "context": context,
        });
        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }
}
