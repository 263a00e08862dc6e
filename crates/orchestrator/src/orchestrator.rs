// crates/orchestrator/src/orchestrator.rs
//! Scheduler - bounded, paced execution of a probe matrix

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use tcp1620_common::{
    sort_records, FailureKind, ProbeOptions, ProbeOutcome, ProbeRecord, ProbeTarget, Prober,
    RunStatistics, TrafficAccountant,
};

use crate::progress::{ProgressListener, ProgressTracker};
use crate::rate_limiter::SubmissionPacer;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// One record per target, in canonical order.
    pub records: Vec<ProbeRecord>,
    pub statistics: RunStatistics,
}

/// Runs probes with at most `max_in_flight` outstanding and a flat delay
/// between submissions.
pub struct Scheduler {
    prober: Arc<dyn Prober>,
    pacer: SubmissionPacer,
    slots: Arc<Semaphore>,
    progress: Arc<ProgressTracker>,
    accountant: Arc<TrafficAccountant>,
}

impl Scheduler {
    pub fn new(prober: Arc<dyn Prober>, accountant: Arc<TrafficAccountant>, options: &ProbeOptions) -> Self {
        Self {
            prober,
            pacer: SubmissionPacer::new(options.submit_delay),
            slots: Arc::new(Semaphore::new(options.max_in_flight.max(1))),
            progress: Arc::new(ProgressTracker::new()),
            accountant,
        }
    }

    /// Report progress to `listener` after every finished probe.
    pub fn with_progress(mut self, listener: ProgressListener) -> Self {
        self.progress = Arc::new(ProgressTracker::with_listener(listener));
        self
    }

    /// Probe every target and wait for all of them.
    ///
    /// A probe that panics is recorded as dead with an internal error, so the
    /// result always holds one record per target.
    #[instrument(skip(self, targets), fields(prober = self.prober.name(), targets = targets.len()))]
    pub async fn run(&self, targets: Vec<ProbeTarget>) -> Result<RunResult> {
        let total = targets.len();
        self.progress.set_total(total).await;
        info!("Starting run: {} probes", total);

        let mut pending = JoinSet::new();
        for target in targets {
            let permit = Arc::clone(&self.slots)
                .acquire_owned()
                .await
                .context("probe slots closed")?;
            self.pacer.acquire().await;

            let prober = Arc::clone(&self.prober);
            let accountant = Arc::clone(&self.accountant);
            let progress = Arc::clone(&self.progress);
            pending.spawn(async move {
                let outcome = probe_guarded(prober, accountant, target.clone()).await;
                drop(permit);
                report_progress(progress, outcome.clone()).await;
                ProbeRecord { target, outcome }
            });
        }

        let mut records = Vec::with_capacity(total);
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(record) => records.push(record),
                Err(e) => error!("probe task lost: {}", e),
            }
        }
        sort_records(&mut records);

        self.progress.print_summary().await;
        let statistics = self.accountant.snapshot();
        info!(
            "Run finished: {} probes, {} bytes sent, {} bytes received",
            statistics.probes_completed, statistics.bytes_sent, statistics.bytes_received
        );

        Ok(RunResult {
            records,
            statistics,
        })
    }
}

/// Update progress on its own task so a failing listener cannot take the
/// record down with it.
async fn report_progress(progress: Arc<ProgressTracker>, outcome: ProbeOutcome) {
    let update = tokio::spawn(async move {
        progress.increment_completed(&outcome).await;
    });
    if let Err(e) = update.await {
        warn!("progress listener failed: {}", e);
    }
}

/// Run one probe on its own task so a panic stays contained.
async fn probe_guarded(
    prober: Arc<dyn Prober>,
    accountant: Arc<TrafficAccountant>,
    target: ProbeTarget,
) -> ProbeOutcome {
    let label = target.to_string();
    let handle = tokio::spawn(async move { prober.probe(&target).await });
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(probe = %label, "probe aborted: {}", e);
            accountant.record_probe();
            ProbeOutcome::Dead {
                error: Some(FailureKind::InternalError),
            }
        }
    }
}
