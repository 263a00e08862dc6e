//! Run configuration
//!
//! Every field is public so the transport and scheduler can read them
//! directly. The defaults are empirically chosen and meant to be tuned.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Tcp1620Error, Tcp1620Result};

/// Body size that crosses the interference threshold.
pub const DEFAULT_BODY_SIZE: usize = 64 * 1024;
pub const DEFAULT_RECV_BUFFER: usize = 8 * 1024;
pub const DEFAULT_DECOY_LABEL_LEN: usize = 15;
pub const DEFAULT_DECOY_TLD: &str = "com";
pub const DEFAULT_DNS_FETCH_DEPTH: usize = 10;

const MAX_IN_FLIGHT_CAP: usize = 32;

/// Tuning knobs for one probing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// Bound on every connect, handshake, write and read.
    pub request_timeout: Duration,
    /// Window for the one-byte "early response" read.
    pub waits_for_body_timeout: Duration,
    /// Flat delay between task submissions.
    pub submit_delay: Duration,
    pub body_size: usize,
    pub recv_buffer: usize,
    pub max_in_flight: usize,
    pub dns_fetch_depth: usize,
    pub decoy_label_len: usize,
    pub decoy_tld: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            waits_for_body_timeout: Duration::from_secs(5),
            submit_delay: Duration::from_millis(150),
            body_size: DEFAULT_BODY_SIZE,
            recv_buffer: DEFAULT_RECV_BUFFER,
            max_in_flight: default_max_in_flight(),
            dns_fetch_depth: DEFAULT_DNS_FETCH_DEPTH,
            decoy_label_len: DEFAULT_DECOY_LABEL_LEN,
            decoy_tld: DEFAULT_DECOY_TLD.to_string(),
        }
    }
}

impl ProbeOptions {
    /// Shorter windows for targets known to answer quickly.
    #[inline]
    #[must_use]
    pub fn fast() -> Self {
        Self {
            request_timeout: Duration::from_secs(8),
            waits_for_body_timeout: Duration::from_secs(2),
            submit_delay: Duration::from_millis(50),
            ..Self::default()
        }
    }

    /// Longer windows and slower submission for lossy paths.
    #[inline]
    #[must_use]
    pub fn careful() -> Self {
        Self {
            request_timeout: Duration::from_secs(25),
            waits_for_body_timeout: Duration::from_secs(8),
            submit_delay: Duration::from_millis(400),
            max_in_flight: 4,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_waits_for_body_timeout(mut self, timeout: Duration) -> Self {
        self.waits_for_body_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn validate(&self) -> Tcp1620Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Tcp1620Error::Config("request timeout must be non-zero".into()));
        }
        if self.waits_for_body_timeout.is_zero() {
            return Err(Tcp1620Error::Config(
                "waits-for-body timeout must be non-zero".into(),
            ));
        }
        if self.waits_for_body_timeout >= self.request_timeout {
            return Err(Tcp1620Error::Config(format!(
                "waits-for-body timeout ({:?}) must be shorter than the request timeout ({:?})",
                self.waits_for_body_timeout, self.request_timeout
            )));
        }
        if self.body_size == 0 || self.recv_buffer == 0 {
            return Err(Tcp1620Error::Config("body and receive sizes must be non-zero".into()));
        }
        if self.max_in_flight == 0 {
            return Err(Tcp1620Error::Config("max in-flight probes must be at least 1".into()));
        }
        if self.decoy_label_len == 0 || self.decoy_tld.trim_matches('.').is_empty() {
            return Err(Tcp1620Error::Config("decoy domain shape is empty".into()));
        }
        Ok(())
    }
}

/// Pool size: available parallelism plus a small I/O allowance, capped.
#[must_use]
pub fn default_max_in_flight() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 4).min(MAX_IN_FLIGHT_CAP)
}
