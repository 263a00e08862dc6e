// crates/transport/src/prober.rs
//! Two-phase prober: HEAD liveness check, then a large POST body probe
//!
//! ```text
//! START -> LIVENESS_CHECK -> DEAD
//!                         -> ALIVE -> BODY_PROBE -> CLEAN | DPI_DETECTED | PROBE_ERROR
//! ```
//!
//! A liveness timeout is ambiguous (loss, filtering) and is reported as
//! plain "dead". A body-probe timeout on a target that just answered is the
//! interference signal.

use async_trait::async_trait;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, instrument};

use tcp1620_common::options::DEFAULT_BODY_SIZE;
use tcp1620_common::{
    Exchange, ExchangeFailure, ExchangeReport, ProbeOutcome, ProbeTarget, Prober,
    TrafficAccountant, Transport,
};

pub struct TwoPhaseProber<T> {
    transport: T,
    accountant: Arc<TrafficAccountant>,
    body_size: usize,
}

impl<T: Transport> TwoPhaseProber<T> {
    pub fn new(transport: T, accountant: Arc<TrafficAccountant>) -> Self {
        Self {
            transport,
            accountant,
            body_size: DEFAULT_BODY_SIZE,
        }
    }

    /// Set the size of the random body sent in the second phase.
    pub fn with_body_size(mut self, body_size: usize) -> Self {
        self.body_size = body_size;
        self
    }

    /// Run both phases. Counts exactly one finished probe whatever happens.
    #[instrument(skip(self, target), fields(probe = %target))]
    pub async fn run(&self, target: &ProbeTarget) -> ProbeOutcome {
        let outcome = self.run_phases(target).await;
        self.accountant.record_probe();
        debug!(?outcome, "probe finished");
        outcome
    }

    async fn run_phases(&self, target: &ProbeTarget) -> ProbeOutcome {
        let liveness = self.transport.exchange(Exchange::liveness(target)).await;
        if let Some(dead) = liveness_outcome(liveness) {
            return dead;
        }
        debug!("alive, sending body probe");

        let body = random_body(self.body_size);
        let result = self
            .transport
            .exchange(Exchange::body_probe(target, &body))
            .await;
        body_probe_outcome(result)
    }
}

/// `Some(Dead)` when the liveness check failed, `None` when alive.
fn liveness_outcome(result: Result<ExchangeReport, ExchangeFailure>) -> Option<ProbeOutcome> {
    match result {
        Ok(_) => None,
        Err(failure) => {
            debug!(error = %failure.error, "liveness check failed");
            Some(ProbeOutcome::Dead {
                error: failure.error.kind(),
            })
        }
    }
}

fn body_probe_outcome(result: Result<ExchangeReport, ExchangeFailure>) -> ProbeOutcome {
    match result {
        Ok(report) => ProbeOutcome::Clean {
            server_waits_for_body: report.server_waits_for_body,
        },
        Err(failure) => match failure.error.kind() {
            None => ProbeOutcome::DpiDetected {
                server_waits_for_body: failure.server_waits_for_body,
            },
            Some(error) => ProbeOutcome::ProbeError {
                server_waits_for_body: failure.server_waits_for_body,
                error,
            },
        },
    }
}

fn random_body(size: usize) -> Vec<u8> {
    let mut body = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut body);
    body
}

#[async_trait]
impl<T: Transport> Prober for TwoPhaseProber<T> {
    async fn probe(&self, target: &ProbeTarget) -> ProbeOutcome {
        self.run(target).await
    }

    fn name(&self) -> &str {
        "two-phase"
    }
}
