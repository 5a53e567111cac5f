//! Remote call failure classification
//!
//! Every catalog API failure is bucketed as transient (worth retrying) or
//! terminal (retrying cannot help). The retry policy only ever replays
//! transient failures.

use std::time::Duration;

/// Classified failure from a remote catalog call.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Retryable: timeouts, rate limits, connection drops, 5xx responses.
    Transient { status: Option<u16>, message: String },
    /// Not retryable: validation and other 4xx-class responses.
    Terminal { status: Option<u16>, message: String },
    /// The call exceeded the configured request timeout (counts as one
    /// retryable failure).
    Timeout { elapsed: Duration },
}

impl ApiError {
    /// Classify an HTTP status. 408/429 and the 5xx class are transient,
    /// everything else in the 4xx class is terminal.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 408 || status == 429 || (500..600).contains(&status) {
            ApiError::Transient { status: Some(status), message }
        } else {
            ApiError::Terminal { status: Some(status), message }
        }
    }

    /// Classify a transport-level error (no HTTP status).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ApiError::Transient { status: None, message: err.to_string() }
        } else {
            ApiError::Terminal { status: None, message: err.to_string() }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient { .. } | ApiError::Timeout { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transient { status, .. } | ApiError::Terminal { status, .. } => *status,
            ApiError::Timeout { .. } => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Transient { status: Some(status), message } => {
                write!(f, "transient remote error (HTTP {status}): {message}")
            }
            ApiError::Transient { status: None, message } => {
                write!(f, "transient remote error: {message}")
            }
            ApiError::Terminal { status: Some(status), message } => {
                write!(f, "remote error (HTTP {status}): {message}")
            }
            ApiError::Terminal { status: None, message } => {
                write!(f, "remote error: {message}")
            }
            ApiError::Timeout { elapsed } => {
                write!(f, "request timed out after {:.1}s", elapsed.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for ApiError {}
