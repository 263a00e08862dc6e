use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a flat delay between consecutive submissions.
///
/// Unlike a token bucket there is no burst allowance: new connections to the
/// target are always at least `delay` apart.
pub struct SubmissionPacer {
    delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl SubmissionPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the next submission slot. The first call returns at once.
    ///
    /// Cancel safe: the slot is only consumed once the wait has finished.
    pub async fn acquire(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            // The timer rounds up to its tick, so never sleep on a past slot.
            if slot > Instant::now() {
                tokio::time::sleep_until(slot).await;
            }
        }
        *next_slot = Some(Instant::now() + self.delay);
    }
}
