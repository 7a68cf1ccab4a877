//! Outbound delivery transport.
//!
//! Every request leaving the agent passes through a fixed list of
//! interceptors (encryption, signing, compression) and is then sent by the
//! retry policy as one fully buffered body.

pub mod chain;
pub mod interceptors;

pub use chain::{ChainOptions, TransportChain, TransportResponse};
pub use interceptors::{Interceptor, PreparedRequest};

use reqwest::StatusCode;
use thiserror::Error;

use crate::security::SecurityError;

/// Statuses worth another attempt
pub const RETRYABLE_STATUSES: [StatusCode; 6] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered with retryable status {0}")]
    RetryableStatus(StatusCode),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },

    #[error("delivery cancelled during backoff")]
    Cancelled,

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableStatus(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(StatusCode::from_u16(code).unwrap()), "{}", code);
        }
        for code in [200, 400, 401, 404, 501] {
            assert!(!is_retryable_status(StatusCode::from_u16(code).unwrap()), "{}", code);
        }
    }

    #[test]
    fn test_only_status_errors_are_retried() {
        assert!(TransportError::RetryableStatus(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
        assert!(!TransportError::RetriesExhausted {
            attempts: 4,
            last: "boom".to_string()
        }
        .is_retryable());
    }
}
