//! # ASMBL Core
//!
//! Core types shared by the ASMBL crates: the error taxonomy used across
//! the merge pipeline and the progress-reporting abstraction consumed by
//! host integrations.

pub mod error;
pub mod progress;

pub use error::{ConfigError, Error, GcodeError, Result, ScheduleError};
pub use progress::{NoOpProgress, ProgressSink, RecordingProgress};
