//! Report rows
//!
//! Plain-string shaping of probe records. Renderers decide styling; this
//! module only decides what each cell says.

use serde::{Deserialize, Serialize};

use crate::types::{ProbeOutcome, ProbeRecord};

pub const NOT_APPLICABLE: &str = "n/a";
pub const EMPTY_BUT_SENT: &str = "empty but sent";

/// Column headers, in row order.
pub const COLUMNS: [&str; 9] = [
    "dst",
    "port",
    "proto",
    "tls",
    "sni",
    "http host header",
    "alive",
    "wfb",
    "dpi",
];

/// Overall verdict for one row, for renderers that colour cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Dead,
    Clean,
    DpiDetected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub dst: String,
    pub port: String,
    pub proto: String,
    pub tls: String,
    pub sni: String,
    pub host_header: String,
    pub alive: String,
    pub wfb: String,
    pub dpi: String,
    /// The SNI value equals the probed host name.
    pub sni_is_host: bool,
    /// The Host header equals the probed host name.
    pub host_header_is_host: bool,
    pub verdict: Verdict,
}

impl ReportRow {
    #[must_use]
    pub fn from_record(record: &ProbeRecord, host: &str) -> Self {
        let target = &record.target;
        let outcome = &record.outcome;
        Self {
            dst: target.ip.to_string(),
            port: target.port.to_string(),
            proto: target.class().label().to_string(),
            tls: target
                .tls_version
                .map_or(NOT_APPLICABLE, |v| v.label())
                .to_string(),
            sni: optional_cell(target.sni.as_deref()),
            host_header: optional_cell(target.host_header.as_deref()),
            alive: alive_cell(outcome),
            wfb: match outcome.server_waits_for_body() {
                None => NOT_APPLICABLE,
                Some(true) => "yes",
                Some(false) => "no",
            }
            .to_string(),
            dpi: dpi_cell(outcome),
            sni_is_host: target.sni.as_deref() == Some(host),
            host_header_is_host: target.host_header.as_deref() == Some(host),
            verdict: verdict(outcome),
        }
    }

    /// Cells in `COLUMNS` order.
    #[must_use]
    pub fn cells(&self) -> [&str; 9] {
        [
            self.dst.as_str(),
            self.port.as_str(),
            self.proto.as_str(),
            self.tls.as_str(),
            self.sni.as_str(),
            self.host_header.as_str(),
            self.alive.as_str(),
            self.wfb.as_str(),
            self.dpi.as_str(),
        ]
    }
}

/// Shape an already sorted record set.
#[must_use]
pub fn build_rows(records: &[ProbeRecord], host: &str) -> Vec<ReportRow> {
    records
        .iter()
        .map(|r| ReportRow::from_record(r, host))
        .collect()
}

fn optional_cell(value: Option<&str>) -> String {
    match value {
        None => NOT_APPLICABLE.to_string(),
        Some("") => EMPTY_BUT_SENT.to_string(),
        Some(v) => v.to_string(),
    }
}

fn alive_cell(outcome: &ProbeOutcome) -> String {
    if outcome.alive() {
        return "yes".to_string();
    }
    outcome
        .alive_error()
        .map_or("no", |e| e.label())
        .to_string()
}

fn dpi_cell(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Dead { .. } => NOT_APPLICABLE,
        ProbeOutcome::DpiDetected { .. } => "detected",
        ProbeOutcome::ProbeError { error, .. } => error.label(),
        ProbeOutcome::Clean { .. } => "not detected",
    }
    .to_string()
}

fn verdict(outcome: &ProbeOutcome) -> Verdict {
    match outcome {
        ProbeOutcome::Dead { .. } => Verdict::Dead,
        ProbeOutcome::Clean { .. } => Verdict::Clean,
        ProbeOutcome::DpiDetected { .. } => Verdict::DpiDetected,
        ProbeOutcome::ProbeError { .. } => Verdict::Error,
    }
}
