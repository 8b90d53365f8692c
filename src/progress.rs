//! Stepwise progress reporting for long-running processing.
//!
//! The pipeline threads a reporter through every slow call instead of
//! keeping process-wide progress state. Reporters are side-effect-only
//! observers: nothing downstream depends on what they do, and they must
//! tolerate being called from worker threads.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Observer for pipeline progress.
///
/// Implementations may drop or rate-limit updates freely; correctness of the
/// run never depends on them.
pub trait ProgressReporter: Send + Sync {
    /// A named pipeline step began.
    fn start_step(&self, name: &str);
    /// Progress within the current step, `fraction` in `[0, 1]`.
    fn update_subprogress(&self, fraction: f64, detail: &str);
    /// The current step finished.
    fn complete_step(&self);
    /// The whole pipeline finished.
    fn finish(&self);
}

/// Reporter that ignores every event.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn start_step(&self, _name: &str) {}
    fn update_subprogress(&self, _fraction: f64, _detail: &str) {}
    fn complete_step(&self) {}
    fn finish(&self) {}
}

/// Reporter that writes throttled progress through the `log` facade.
pub struct LogProgress {
    min_interval: Duration,
    state: Mutex<ProgressState>,
}

struct ProgressState {
    current_step: Option<String>,
    last_update: Option<Instant>,
}

impl LogProgress {
    /// Update interval in verbose mode.
    pub const VERBOSE_INTERVAL: Duration = Duration::from_millis(500);
    /// Update interval otherwise.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    pub fn new(verbose: bool) -> Self {
        let min_interval = if verbose {
            Self::VERBOSE_INTERVAL
        } else {
            Self::DEFAULT_INTERVAL
        };
        Self {
            min_interval,
            state: Mutex::new(ProgressState {
                current_step: None,
                last_update: None,
            }),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn start_step(&self, name: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.current_step = Some(name.to_string());
        state.last_update = None;
        log::info!("{name}...");
    }

    fn update_subprogress(&self, fraction: f64, detail: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let now = Instant::now();
        if let Some(last) = state.last_update {
            if now.duration_since(last) < self.min_interval {
                return;
            }
        }
        state.last_update = Some(now);
        let step = state.current_step.as_deref().unwrap_or("working");
        log::info!("{step}: {:3.0}% ({detail})", fraction * 100.0);
    }

    fn complete_step(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(step) = state.current_step.take() {
            log::info!("{step}: done");
        }
        state.last_update = None;
    }

    fn finish(&self) {
        log::info!("processing complete");
    }
}
