//! Progress tracking

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use tcp1620_common::ProbeOutcome;

/// Completed/total snapshot handed to progress listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Fraction in [0.0, 1.0]; an empty run counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.fraction() * 100.0)
    }
}

pub type ProgressListener = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Default)]
struct Counts {
    total: usize,
    completed: usize,
    alive: usize,
    dpi_detected: usize,
    errors: usize,
}

pub struct ProgressTracker {
    counts: Mutex<Counts>,
    listener: Option<ProgressListener>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(Counts::default()),
            listener: None,
        }
    }

    pub fn with_listener(listener: ProgressListener) -> Self {
        Self {
            counts: Mutex::new(Counts::default()),
            listener: Some(listener),
        }
    }

    pub async fn set_total(&self, total: usize) {
        let mut counts = self.counts.lock().await;
        *counts = Counts {
            total,
            ..Counts::default()
        };
    }

    /// Record one finished probe and notify the listener.
    ///
    /// The listener runs under the lock so it never sees counts go backwards.
    pub async fn increment_completed(&self, outcome: &ProbeOutcome) -> Progress {
        let mut counts = self.counts.lock().await;
        counts.completed += 1;
        if outcome.alive() {
            counts.alive += 1;
        }
        if outcome.dpi_detected() == Some(true) {
            counts.dpi_detected += 1;
        }
        if outcome.alive_error().is_some() || outcome.dpi_error().is_some() {
            counts.errors += 1;
        }
        let progress = Progress {
            completed: counts.completed,
            total: counts.total,
        };
        if let Some(listener) = &self.listener {
            listener(progress);
        }
        progress
    }

    pub async fn snapshot(&self) -> Progress {
        let counts = self.counts.lock().await;
        Progress {
            completed: counts.completed,
            total: counts.total,
        }
    }

    pub async fn print_summary(&self) {
        let counts = self.counts.lock().await;

        info!("Probe Summary:");
        info!("  Total probes: {}", counts.total);
        info!("  Completed: {}", counts.completed);
        info!("  Alive: {}", counts.alive);
        info!("  DPI detected: {}", counts.dpi_detected);
        info!("  Errors: {}", counts.errors);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    #[tokio::test]
    async fn listener_sees_every_completion() {
        let seen = Arc::new(SyncMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::with_listener(Arc::new(move |p| sink.lock().push(p)));
        tracker.set_total(3).await;

        tracker
            .increment_completed(&ProbeOutcome::Dead { error: None })
            .await;
        tracker
            .increment_completed(&ProbeOutcome::Clean {
                server_waits_for_body: false,
            })
            .await;
        let last = tracker
            .increment_completed(&ProbeOutcome::DpiDetected {
                server_waits_for_body: true,
            })
            .await;

        assert_eq!(last, Progress { completed: 3, total: 3 });
        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0].completed < w[1].completed));
    }

    #[test]
    fn progress_display() {
        let p = Progress {
            completed: 1,
            total: 3,
        };
        assert_eq!(p.to_string(), "33.3%");
        assert_eq!(
            Progress {
                completed: 0,
                total: 0
            }
            .fraction(),
            1.0
        );
    }

    #[tokio::test]
    async fn set_total_resets_counts() {
        let tracker = ProgressTracker::new();
        tracker.set_total(2).await;
        tracker
            .increment_completed(&ProbeOutcome::Dead { error: None })
            .await;
        tracker.set_total(5).await;
        assert_eq!(tracker.snapshot().await, Progress { completed: 0, total: 5 });
    }
}
