//! Error types for tcp1620
//!
//! Two layers: `ProbeError` is the per-connection failure taxonomy that is
//! folded into outcomes and never aborts a run, `Tcp1620Error` covers the
//! pre-flight failures that do.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Failure classification recorded in a probe outcome.
///
/// Timeouts are deliberately absent: the state machine turns them into
/// "dead" or "dpi detected" instead of an error cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TlsError,
    ConnectionError,
    InternalError,
}

impl FailureKind {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TlsError => "tls_error",
            FailureKind::ConnectionError => "connection_error",
            FailureKind::InternalError => "internal_error",
        }
    }

    /// Short label used in report cells.
    #[inline]
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            FailureKind::TlsError => "tls err",
            FailureKind::ConnectionError => "conn err",
            FailureKind::InternalError => "internal err",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single transport exchange.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timed out during {0}")]
    Timeout(&'static str),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("connection error: {0}")]
    Connection(#[source] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    #[inline]
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }

    /// Outcome classification; `None` for timeouts.
    #[must_use]
    pub const fn kind(&self) -> Option<FailureKind> {
        match self {
            ProbeError::Timeout(_) => None,
            ProbeError::Tls(_) => Some(FailureKind::TlsError),
            ProbeError::Connection(_) => Some(FailureKind::ConnectionError),
            ProbeError::Internal(_) => Some(FailureKind::InternalError),
        }
    }
}

/// A failed exchange, with what was observed before it failed.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ExchangeFailure {
    pub error: ProbeError,
    pub server_waits_for_body: bool,
}

/// Pre-flight errors that abort a run before any probe is submitted.
#[derive(Error, Debug)]
pub enum Tcp1620Error {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Resolution failed: {0}")]
    Resolve(String),

    #[error("Invalid task matrix: {0}")]
    InvalidMatrix(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for pre-flight operations
pub type Tcp1620Result<T> = Result<T, Tcp1620Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_has_no_kind() {
        let err = ProbeError::Timeout("connect");
        assert!(err.is_timeout());
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(
            ProbeError::Tls("bad record".into()).kind(),
            Some(FailureKind::TlsError)
        );
        let io = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(
            ProbeError::Connection(io).kind(),
            Some(FailureKind::ConnectionError)
        );
        assert_eq!(
            ProbeError::Internal("x".into()).kind(),
            Some(FailureKind::InternalError)
        );
    }

    #[test]
    fn exchange_failure_displays_cause_and_keeps_wait_flag() {
        let failure = ExchangeFailure {
            error: ProbeError::Timeout("response drain"),
            server_waits_for_body: true,
        };
        assert_eq!(failure.to_string(), failure.error.to_string());
        assert!(failure.server_waits_for_body);
        assert!(failure.error.is_timeout());
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::ConnectionError).unwrap();
        assert_eq!(json, "\"connection_error\"");
    }
}
