//! Error handling for ASMBL
//!
//! Provides error types for each stage of the merge pipeline:
//! - G-Code errors (tokenizing, extrusion normalization, cam heights)
//! - Scheduling errors (insertion height assignment)
//! - Configuration errors (validation and file formats)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// G-Code error type
///
/// Represents defects found in the source G-code streams.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// An absolute extrusion move was found before any `G92 E` reset for the active tool
    #[error(
        "Missing extrusion baseline at line {line_number}: no G92 E reset seen for tool {}",
        .tool.as_deref().unwrap_or("<none>")
    )]
    MissingExtrusionBaseline {
        /// The 1-based line number of the offending move.
        line_number: usize,
        /// The tool that was active, if any had been selected.
        tool: Option<String>,
    },

    /// A cutting segment has no Z information at all
    #[error("Cutting segment in operation '{operation}' has no Z height")]
    MissingCuttingHeight {
        /// The operation the segment belongs to.
        operation: String,
    },

    /// A parameter value the pipeline must interpret is malformed
    #[error("Invalid parameter '{param}' at line {line_number}: {reason}")]
    InvalidParameter {
        /// The line number where the invalid parameter was found.
        line_number: usize,
        /// The parameter name.
        param: String,
        /// The reason the parameter is invalid.
        reason: String,
    },
}

/// Scheduling error type
///
/// Raised when the layer-height scheduler produces an impossible result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// A cam layer was assigned an infinite insertion height
    #[error("CAM layer '{layer}' (cutting height {cutting_height}) was scheduled at an infinite height")]
    InfiniteInsertionHeight {
        /// The name of the cam layer.
        layer: String,
        /// The cutting height of the cam layer.
        cutting_height: f64,
    },

    /// A cam layer reached the merge step without an insertion height
    #[error("CAM layer '{layer}' has not been scheduled")]
    Unscheduled {
        /// The name of the cam layer.
        layer: String,
    },
}

/// Configuration error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A configuration value is invalid
    #[error("Invalid setting '{key}': {reason}")]
    InvalidValue {
        /// The setting key, e.g. `CamSettings.layer_dropdown`.
        key: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The configuration file format is not supported
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The configuration file could not be parsed or serialized
    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Main error type for ASMBL
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Scheduling error
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a G-Code error
    pub fn is_gcode_error(&self) -> bool {
        matches!(self, Error::Gcode(_))
    }

    /// Check if this is a scheduling error
    pub fn is_schedule_error(&self) -> bool {
        matches!(self, Error::Schedule(_))
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
