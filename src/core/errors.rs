use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Missing or malformed API credentials. Raised locally, before any network I/O.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// HTTP 429. `execute` reports this as `ApiResponse::RateLimited`; the
    /// variant only appears when a caller converts the response into a `Result`.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP error {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    /// A single stream frame could not be parsed
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Listen key renewal failed: {0}")]
    AuthRenewalFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ExchangeError {
    /// HTTP status carried by the error, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::HttpError {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => Self::TransportError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::DeserializationError(err.to_string())
    }
}
