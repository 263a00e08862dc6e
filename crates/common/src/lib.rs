//! tcp1620 Common - Shared types and traits
//!
//! This crate provides the data model, error taxonomy, traffic accounting
//! and run options used across the tcp1620 prober.

pub mod error;
pub mod options;
pub mod report;
pub mod stats;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ExchangeFailure, FailureKind, ProbeError, Tcp1620Error, Tcp1620Result};
pub use options::ProbeOptions;
pub use report::{build_rows, ReportRow, Verdict};
pub use stats::{RunStatistics, TrafficAccountant};
pub use traits::{Exchange, ExchangeReport, HttpMethod, Prober, Transport};
pub use types::{
    sort_records, DecoyIdentity, ProbeOutcome, ProbeRecord, ProbeTarget, Protocol, ProtocolClass,
    TlsVersion, HTTPS_PORT, HTTP_PORT,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
