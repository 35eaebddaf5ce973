//! Error types for the weather/energy pipeline.
//!
//! Failures are contained at the smallest unit possible: a single request
//! ([`FetchError`]), a whole source adapter ([`SourceUnavailable`]), or the
//! surrounding plumbing ([`ConfigError`], [`OutputError`]).

use std::fmt;

use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};
use thiserror::Error;

/// Identifies which upstream a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Noaa,
    Eia,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Noaa => write!(f, "NOAA"),
            SourceKind::Eia => write!(f, "EIA"),
        }
    }
}

/// Outcome of a single request that did not produce a payload.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Upstream signalled throttling (HTTP 429).
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// Network failure, timeout, non-2xx status or undecodable body.
    #[error("transient request error: {0}")]
    Transient(#[from] TransientError),

    /// The request descriptor cannot be turned into a request; never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Retry budget spent; terminal for one fetch unit.
    #[error("retries exhausted after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<FetchError>,
    },
}

#[derive(Error, Debug)]
pub enum TransientError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected status {status} {reason}: {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A credential that cannot be placed on the wire.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("invalid header name: {0}")]
    HeaderName(#[from] InvalidHeaderName),

    #[error("credential is not a valid header value")]
    HeaderValue(#[from] InvalidHeaderValue),
}

/// A whole adapter invocation failed before any request could be issued.
#[derive(Error, Debug)]
#[error("{kind} source unavailable: {reason}")]
pub struct SourceUnavailable {
    pub kind: SourceKind,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FetchError {
    /// Builds the error for a non-2xx, non-429 response.
    pub fn status(status: reqwest::StatusCode, body: String) -> Self {
        Self::Transient(TransientError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

impl SourceUnavailable {
    pub fn missing_credential(kind: SourceKind, field: &str) -> Self {
        Self {
            kind,
            reason: format!("missing credential `{field}`"),
        }
    }

    pub fn invalid_credential(kind: SourceKind, err: CredentialError) -> Self {
        Self {
            kind,
            reason: err.to_string(),
        }
    }
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_reason() {
        let err = FetchError::status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "down".into());
        assert_eq!(
            err.to_string(),
            "transient request error: unexpected status 503 Service Unavailable: down"
        );
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_retries_exhausted_mentions_last_error() {
        let err = FetchError::RetriesExhausted {
            attempts: 6,
            last: Box::new(FetchError::RateLimited),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 6 attempts, last error: rate limited by upstream (HTTP 429)"
        );
    }

    #[test]
    fn test_missing_credential() {
        let err = SourceUnavailable::missing_credential(SourceKind::Eia, "eia_api_key");
        assert_eq!(
            err.to_string(),
            "EIA source unavailable: missing credential `eia_api_key`"
        );
    }

    #[test]
    fn test_parse_error_leaves_cause_to_source() {
        let cause = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        let cause_text = cause.to_string();
        let err = ConfigError::Parse {
            path: "config/config.json".into(),
            error: cause,
        };

        assert_eq!(err.to_string(), "failed to parse config file config/config.json");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), cause_text);
    }

    #[test]
    fn test_invalid_config_value() {
        let err = ConfigError::invalid("retry.backoff_factor", "must be >= 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for retry.backoff_factor: must be >= 1"
        );
    }
}
