use std::time::Duration;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Aborted,
    Network,
    Other,
}

/// Why a request did not produce a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// An attempt outlived its timeout and was dropped.
    #[error("request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    /// The call was cancelled, by the caller's signal or by the transport.
    #[error("request aborted")]
    Aborted,

    /// Connection, DNS or body transfer failure.
    #[error("network error: {0}")]
    Network(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),

    /// Retries were exhausted without any specific cause being captured.
    #[error("Request failed")]
    RequestFailed,

    /// The request could not be built, e.g. a bad URL or header. Never retried.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout { .. } => FailureKind::Timeout,
            FetchError::Aborted => FailureKind::Aborted,
            FetchError::Network(_) => FailureKind::Network,
            FetchError::Other(_) | FetchError::RequestFailed | FetchError::InvalidRequest { .. } => {
                FailureKind::Other
            }
        }
    }

    /// A malformed request fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::InvalidRequest { .. })
    }

    /// Only timeouts and cancellations wait out the backoff before retrying.
    pub fn wants_backoff(&self) -> bool {
        matches!(self.kind(), FailureKind::Timeout | FailureKind::Aborted)
    }
}

impl From<url::ParseError> for FetchError {
    fn from(error: url::ParseError) -> Self {
        FetchError::InvalidRequest {
            message: format!("bad url: {}", error),
        }
    }
}

impl From<http::header::InvalidHeaderName> for FetchError {
    fn from(error: http::header::InvalidHeaderName) -> Self {
        FetchError::InvalidRequest {
            message: error.to_string(),
        }
    }
}

impl From<http::header::InvalidHeaderValue> for FetchError {
    fn from(error: http::header::InvalidHeaderValue) -> Self {
        FetchError::InvalidRequest {
            message: error.to_string(),
        }
    }
}

/// Errors raised while loading configuration from the environment.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {name}")]
    Missing { name: &'static str },

    #[error("invalid value for {name}: {value:?} ({message})")]
    Invalid {
        name: &'static str,
        value: String,
        message: String,
    },
}
