//! Core data types for the tcp1620 prober
//!
//! Targets are plain value tuples; outcomes are terminal states of the
//! two-phase probe and are never mutated once built. Both order totally so
//! a result set sorts the same way regardless of completion order.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::FailureKind;

/// Well-known ports the matrix probes.
pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

const DECOY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Transport wrapping of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Plain,
    Tls,
}

impl Protocol {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Plain => "plain",
            Protocol::Tls => "tls",
        }
    }
}

/// TLS version pinned for a probe. No fallback is ever negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "1.3")]
    V1_3,
}

impl TlsVersion {
    pub const ALL: [TlsVersion; 2] = [TlsVersion::V1_2, TlsVersion::V1_3];

    #[inline]
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            TlsVersion::V1_2 => "v1.2",
            TlsVersion::V1_3 => "v1.3",
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Presentation class of a target, in canonical report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolClass {
    Http,
    HttpOverTlsPort,
    Https,
}

impl ProtocolClass {
    #[inline]
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            ProtocolClass::Http => "http",
            ProtocolClass::HttpOverTlsPort => "http over https",
            ProtocolClass::Https => "https",
        }
    }
}

/// One cell of the probe matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub protocol: Protocol,
    pub tls_version: Option<TlsVersion>,
    pub sni: Option<String>,
    pub host_header: Option<String>,
}

impl ProbeTarget {
    /// Plaintext HTTP target.
    #[inline]
    #[must_use]
    pub fn plain(ip: Ipv4Addr, port: u16, host_header: Option<String>) -> Self {
        Self {
            ip,
            port,
            protocol: Protocol::Plain,
            tls_version: None,
            sni: None,
            host_header,
        }
    }

    /// TLS-wrapped HTTP target pinned to `version`.
    #[inline]
    #[must_use]
    pub fn tls(
        ip: Ipv4Addr,
        port: u16,
        version: TlsVersion,
        sni: Option<String>,
        host_header: Option<String>,
    ) -> Self {
        Self {
            ip,
            port,
            protocol: Protocol::Tls,
            tls_version: Some(version),
            sni,
            host_header,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.protocol, Protocol::Tls)
    }

    #[must_use]
    pub const fn class(&self) -> ProtocolClass {
        match self.protocol {
            Protocol::Tls => ProtocolClass::Https,
            Protocol::Plain if self.port == HTTPS_PORT => ProtocolClass::HttpOverTlsPort,
            Protocol::Plain => ProtocolClass::Http,
        }
    }

    fn port_rank(&self) -> (u8, u16) {
        match self.port {
            HTTP_PORT => (0, self.port),
            HTTPS_PORT => (1, self.port),
            other => (2, other),
        }
    }
}

impl Ord for ProbeTarget {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ip
            .cmp(&other.ip)
            .then_with(|| self.port_rank().cmp(&other.port_rank()))
            .then_with(|| self.class().cmp(&other.class()))
            .then_with(|| self.protocol.cmp(&other.protocol))
            .then_with(|| self.tls_version.cmp(&other.tls_version))
            .then_with(|| self.sni.cmp(&other.sni))
            .then_with(|| self.host_header.cmp(&other.host_header))
    }
}

impl PartialOrd for ProbeTarget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.ip, self.port, self.class().label())?;
        if let Some(v) = self.tls_version {
            write!(f, " {}", v)?;
        }
        write!(
            f,
            " sni={} host={}",
            self.sni.as_deref().unwrap_or("-"),
            self.host_header.as_deref().unwrap_or("-")
        )
    }
}

/// Terminal state of one two-phase probe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Liveness check failed. `error` is `None` when it simply timed out.
    Dead { error: Option<FailureKind> },
    Clean { server_waits_for_body: bool },
    DpiDetected { server_waits_for_body: bool },
    ProbeError {
        server_waits_for_body: bool,
        error: FailureKind,
    },
}

impl ProbeOutcome {
    #[inline]
    #[must_use]
    pub const fn alive(&self) -> bool {
        !matches!(self, ProbeOutcome::Dead { .. })
    }

    #[inline]
    #[must_use]
    pub const fn alive_error(&self) -> Option<FailureKind> {
        match self {
            ProbeOutcome::Dead { error } => *error,
            _ => None,
        }
    }

    /// `None` when the target was never alive.
    #[inline]
    #[must_use]
    pub const fn server_waits_for_body(&self) -> Option<bool> {
        match self {
            ProbeOutcome::Dead { .. } => None,
            ProbeOutcome::Clean { server_waits_for_body }
            | ProbeOutcome::DpiDetected { server_waits_for_body }
            | ProbeOutcome::ProbeError { server_waits_for_body, .. } => {
                Some(*server_waits_for_body)
            }
        }
    }

    /// `None` when the target was never alive.
    #[inline]
    #[must_use]
    pub const fn dpi_detected(&self) -> Option<bool> {
        match self {
            ProbeOutcome::Dead { .. } => None,
            ProbeOutcome::DpiDetected { .. } => Some(true),
            ProbeOutcome::Clean { .. } | ProbeOutcome::ProbeError { .. } => Some(false),
        }
    }

    #[inline]
    #[must_use]
    pub const fn dpi_error(&self) -> Option<FailureKind> {
        match self {
            ProbeOutcome::ProbeError { error, .. } => Some(*error),
            _ => None,
        }
    }
}

/// A target together with the outcome of probing it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub target: ProbeTarget,
    pub outcome: ProbeOutcome,
}

impl ProbeRecord {
    #[inline]
    #[must_use]
    pub fn new(target: ProbeTarget, outcome: ProbeOutcome) -> Self {
        Self { target, outcome }
    }
}

/// Sort records into canonical report order.
pub fn sort_records(records: &mut [ProbeRecord]) {
    records.sort();
}

/// Random domain that should mean nothing to the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecoyIdentity(String);

impl DecoyIdentity {
    /// Generate a `label_len` lowercase alphanumeric label under `tld`.
    #[must_use]
    pub fn generate(label_len: usize, tld: &str) -> Self {
        Self::generate_with(&mut rand::thread_rng(), label_len, tld)
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, label_len: usize, tld: &str) -> Self {
        let label: String = (0..label_len)
            .map(|_| char::from(DECOY_CHARSET[rng.gen_range(0..DECOY_CHARSET.len())]))
            .collect();
        Self(format!("{}.{}", label, tld.trim_start_matches('.')))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecoyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
