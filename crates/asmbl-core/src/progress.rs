//! Progress reporting for long-running merges.
//!
//! The merge pipeline reports each phase boundary to an optional
//! [`ProgressSink`]. A sink only observes: it never influences the result,
//! and running without one behaves identically.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Observer of pipeline phase boundaries.
pub trait ProgressSink: Send + Sync {
    /// Called with a human-readable description of the phase being entered
    fn message(&self, msg: &str);

    /// Called once per completed phase boundary
    fn increment(&self);
}

/// Sink that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn message(&self, _msg: &str) {}
    fn increment(&self) {}
}

/// Sink that records messages and counts increments.
///
/// Useful for hosts that poll progress from another thread, and for tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
    steps: AtomicU32,
}

impl RecordingProgress {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, in order
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of increments received so far
    pub fn steps(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }
}

impl ProgressSink for RecordingProgress {
    fn message(&self, msg: &str) {
        match self.messages.lock() {
            Ok(mut messages) => messages.push(msg.to_string()),
            Err(poisoned) => poisoned.into_inner().push(msg.to_string()),
        }
    }

    fn increment(&self) {
        self.steps.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_progress() {
        let progress = RecordingProgress::new();
        progress.message("Opening files");
        progress.increment();
        progress.message("Merging gcode layers");
        progress.increment();

        assert_eq!(progress.steps(), 2);
        assert_eq!(
            progress.messages(),
            vec!["Opening files".to_string(), "Merging gcode layers".to_string()]
        );
    }

    #[test]
    fn test_noop_progress_is_object_safe() {
        let sink: &dyn ProgressSink = &NoOpProgress;
        sink.message("ignored");
        sink.increment();
    }
}
