//! Traffic accounting
//!
//! One counter set per run, injected as `Arc<TrafficAccountant>` into every
//! probe. All three counters sit behind a single lock so a snapshot is
//! always internally consistent.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Final counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub probes_completed: u64,
}

impl RunStatistics {
    #[inline]
    #[must_use]
    pub fn sent_kib(&self) -> f64 {
        self.bytes_sent as f64 / 1024.0
    }

    #[inline]
    #[must_use]
    pub fn received_kib(&self) -> f64 {
        self.bytes_received as f64 / 1024.0
    }
}

/// Thread-safe counters for bytes sent, bytes received and finished probes.
#[derive(Debug, Default)]
pub struct TrafficAccountant {
    inner: Mutex<RunStatistics>,
}

impl TrafficAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_traffic(&self, sent: u64, received: u64) {
        let mut stats = self.inner.lock();
        stats.bytes_sent = stats.bytes_sent.saturating_add(sent);
        stats.bytes_received = stats.bytes_received.saturating_add(received);
    }

    pub fn record_probe(&self) {
        let mut stats = self.inner.lock();
        stats.probes_completed = stats.probes_completed.saturating_add(1);
    }

    #[must_use]
    pub fn snapshot(&self) -> RunStatistics {
        *self.inner.lock()
    }
}
