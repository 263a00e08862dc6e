//! Output formatting for probe reports

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::net::Ipv4Addr;
use std::time::Duration;
use uuid::Uuid;

use crate::args::OutputFormat;
use tcp1620_common::report::COLUMNS;
use tcp1620_common::{build_rows, DecoyIdentity, ProbeOptions, ReportRow, RunStatistics};
use tcp1620_orchestrator::{Progress, RunResult};
use tcp1620_target_resolver::ResolvedTarget;

/// Marks SNI / Host cells that carry the real host name.
const REAL_HOST_MARK: &str = "*";

/// Everything a renderer needs for one finished run.
pub struct Report<'a> {
    pub resolved: &'a ResolvedTarget,
    pub decoy: &'a DecoyIdentity,
    pub options: &'a ProbeOptions,
    pub result: &'a RunResult,
    pub elapsed: Duration,
}

impl Report<'_> {
    fn rows(&self) -> Vec<ReportRow> {
        build_rows(&self.result.records, &self.resolved.host)
    }
}

/// Print the report to stdout in the requested format.
pub fn print_report(report: &Report<'_>, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Text => render_text(report),
        OutputFormat::Json => render_json(report)?,
        OutputFormat::Csv => render_csv(report),
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Progress line on stderr, rewritten in place.
pub fn print_progress(progress: Progress) {
    eprint!("\rchecking... progress: {:.0}%", progress.fraction() * 100.0);
    if progress.completed >= progress.total {
        eprintln!();
    }
}

pub fn summary_line(stats: &RunStatistics) -> String {
    format!(
        "done; checks: {}, tcp tx: {:.2}KB, rx: {:.2}KB",
        stats.probes_completed,
        stats.sent_kib(),
        stats.received_kib()
    )
}

fn render_text(report: &Report<'_>) -> String {
    let resolved = report.resolved;
    let mut out = String::new();

    out.push_str(&format!("host: {}\n", resolved.host));
    if resolved.forced {
        out.push_str("a records: n/a (address forced)\n");
    } else if resolved.a_records.is_empty() {
        out.push_str("a records: n/a\n");
    } else {
        out.push_str(&format!("a records: {}\n", join_ips(&resolved.a_records)));
    }
    out.push_str(&format!("lookup ip: {}\n", resolved.ip));
    out.push_str(&format!("decoy: {}\n", report.decoy));
    out.push_str(&format!(
        "legend: {} real host name; wfb = server waits for body; dpi = size-triggered interference\n",
        REAL_HOST_MARK
    ));
    out.push_str(
        "note: http host header in https mode only matters to the server; the censor cannot see it\n\n",
    );

    let table: Vec<[String; 9]> = report.rows().iter().map(marked_cells).collect();
    let mut widths = COLUMNS.map(str::len);
    for cells in &table {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.len());
        }
    }

    push_row(&mut out, &COLUMNS.map(str::to_string), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for cells in &table {
        push_row(&mut out, cells, &widths);
    }

    out.push('\n');
    out.push_str(&summary_line(&report.result.statistics));
    out.push('\n');
    out.push_str(&format!("elapsed: {}\n", format_duration(report.elapsed)));
    out
}

fn marked_cells(row: &ReportRow) -> [String; 9] {
    let mut cells = row.cells().map(str::to_string);
    if row.sni_is_host {
        cells[4].push_str(REAL_HOST_MARK);
    }
    if row.host_header_is_host {
        cells[5].push_str(REAL_HOST_MARK);
    }
    cells
}

fn push_row(out: &mut String, cells: &[String; 9], widths: &[usize; 9]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}

#[derive(Serialize)]
struct JsonReport<'a> {
    run_id: Uuid,
    generated_at: String,
    host: &'a str,
    ip: Ipv4Addr,
    a_records: &'a [Ipv4Addr],
    address_forced: bool,
    decoy: &'a str,
    duration_seconds: f64,
    options: &'a ProbeOptions,
    rows: Vec<ReportRow>,
    statistics: &'a RunStatistics,
}

fn render_json(report: &Report<'_>) -> Result<String> {
    let body = JsonReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now().to_rfc3339(),
        host: &report.resolved.host,
        ip: report.resolved.ip,
        a_records: &report.resolved.a_records,
        address_forced: report.resolved.forced,
        decoy: report.decoy.as_str(),
        duration_seconds: report.elapsed.as_secs_f64(),
        options: report.options,
        rows: report.rows(),
        statistics: &report.result.statistics,
    };
    let mut rendered = serde_json::to_string_pretty(&body)?;
    rendered.push('\n');
    Ok(rendered)
}

fn render_csv(report: &Report<'_>) -> String {
    let mut out = COLUMNS.map(csv_field).join(",");
    out.push('\n');
    for row in report.rows() {
        out.push_str(&row.cells().map(csv_field).join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn join_ips(ips: &[Ipv4Addr]) -> String {
    ips.iter().map(Ipv4Addr::to_string).collect::<Vec<_>>().join(", ")
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    }
}
