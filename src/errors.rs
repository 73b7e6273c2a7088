/*!
 * Error types for the tablewai application.
 *
 * Transport problems are raised by the HTTP clients as `ProviderError`,
 * wrapped into a `BackendError` naming the backend once they cross the
 * adapter boundary, and folded by the hub into a `TranslationError` when no
 * backend could produce a valid result.
 */

use std::fmt;

use thiserror::Error;

/// Maximum number of characters of remote diagnostic text kept in an error
pub const MAX_DIAGNOSTIC_CHARS: usize = 300;

/// Errors that can occur when talking to a provider's HTTP API
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// HTTP status carried by this error, when there is one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } => Some(*status_code),
            Self::RateLimitExceeded(_) => Some(429),
            Self::AuthenticationError(_) => Some(401),
            _ => None,
        }
    }
}

/// What went wrong inside a single backend call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendErrorKind {
    /// Non-success transport or connection failure
    #[error("transport failure{}: {detail}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        /// HTTP status if the server answered
        status: Option<u16>,
        /// Truncated diagnostic text
        detail: String,
    },

    /// The backend answered with nothing usable
    #[error("empty response")]
    EmptyResponse,

    /// The response text could not be repaired into JSON
    #[error("unparsable response: {0}")]
    Parse(String),

    /// The response parsed but does not match the request shape
    #[error("response shape mismatch: {0}")]
    ResponseShape(String),

    /// No credentials are configured for the backend
    #[error("credentials missing")]
    CredentialMissing,
}

/// A failed call to one named backend
#[derive(Error, Debug, Clone, PartialEq)]
#[error("backend '{backend}' failed: {kind}")]
pub struct BackendError {
    /// Name of the backend that failed
    pub backend: String,
    /// Cause of the failure
    pub kind: BackendErrorKind,
}

impl BackendError {
    /// Create a new backend error
    pub fn new(backend: impl Into<String>, kind: BackendErrorKind) -> Self {
        Self {
            backend: backend.into(),
            kind,
        }
    }

    /// Build a transport error from a provider error
    pub fn transport(backend: impl Into<String>, error: &ProviderError) -> Self {
        Self::new(
            backend,
            BackendErrorKind::Transport {
                status: error.status_code(),
                detail: truncate_diagnostic(&error.to_string()),
            },
        )
    }

    /// Build a parse error
    pub fn parse(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(backend, BackendErrorKind::Parse(truncate_diagnostic(&detail.into())))
    }

    /// Build a shape mismatch error
    pub fn shape(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(backend, BackendErrorKind::ResponseShape(detail.into()))
    }
}

/// Every attempt made by the hub before giving up
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttemptLog(pub Vec<BackendError>);

impl fmt::Display for AttemptLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors raised by the translation hub
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// No backend is enabled and credentialed
    #[error("no translation backend is available")]
    NoBackendAvailable,

    /// A backend was requested by name but is not registered
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    /// A backend was requested by name but cannot be used
    #[error("backend '{0}' is not available (missing credentials or disabled)")]
    BackendUnavailable(String),

    /// Every backend in the fallback chain failed
    #[error("all backends failed after {} attempts: {attempts}", .attempts.0.len())]
    AllBackendsFailed {
        /// The failed attempts, in order
        attempts: AttemptLog,
    },
}

/// Errors raised while ingesting records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// A row was not a JSON object
    #[error("row {row} is not an object")]
    NotAnObject {
        /// Offending row index
        row: usize,
    },

    /// A cell held a nested value
    #[error("row {row}, column '{column}' holds a non-scalar value")]
    NonScalar {
        /// Offending row index
        row: usize,
        /// Offending column key
        column: String,
    },

    /// The document root had an unexpected shape
    #[error("document must be an array of records or an object with a 'records' array")]
    InvalidDocument,
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from record ingestion
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

/// Truncate remote diagnostic text so errors stay readable
pub fn truncate_diagnostic(text: &str) -> String {
    if text.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
        format!("{}...", head)
    }
}
