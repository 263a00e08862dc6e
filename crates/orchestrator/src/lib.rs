//! Orchestrator - probe matrix generation and paced, bounded execution

pub mod matrix;
mod orchestrator;
mod progress;
mod rate_limiter;

pub use orchestrator::{RunResult, Scheduler};
pub use progress::{Progress, ProgressListener, ProgressTracker};
pub use rate_limiter::SubmissionPacer;
