//! # ASMBL
//!
//! Merges an additive (FFF) G-code program and a subtractive (CNC) G-code
//! program into one layer-interleaved script for hybrid machines, so that
//! each milling pass runs as soon as the material it cuts has been printed.
//!
//! ## Architecture
//!
//! ASMBL is organized as a workspace with multiple crates:
//!
//! 1. **asmbl-core** - Error types and the progress sink
//! 2. **asmbl-gcode** - Line tokenizer, coordinate offsetter, extrusion normalizer
//! 3. **asmbl-settings** - Merge configuration and its persistence
//! 4. **asmbl-merge** - Layer splitting, scheduling, merging and emission
//! 5. **asmbl** - This crate, re-exporting the above plus logging setup
//!
//! ## Example
//!
//! ```no_run
//! use asmbl::{Config, HybridMerger};
//! use std::path::Path;
//!
//! # fn main() -> asmbl::Result<()> {
//! let config = Config::load_from_file(Path::new("config.json"))?;
//! let output = HybridMerger::new(config).merge_files()?;
//! output.write_to(Path::new("output"))?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;

pub use asmbl_core::{
    ConfigError, Error, GcodeError, NoOpProgress, ProgressSink, RecordingProgress, Result,
    ScheduleError,
};

pub use asmbl_gcode::{
    format_float, offset, parse_line, parse_lines, to_relative_extrusion, Command,
    CoordinateOffset, GcodeLine, LineKind, ParamValue, RelativeExtrusionConverter,
};

pub use asmbl_settings::{CamSettings, Config, InputFiles, OutputSettings, PrintSettings, Printer};

pub use asmbl_merge::{
    merge_and_emit, schedule_insertion_heights, split_additive_layers, split_cam_operations,
    AdditiveLayer, AdditiveLayerKind, CamLayer, CamSegment, HybridMerger, MergeOutput,
    MergedLayer, NonPlanarOperationGroup, CLEARANCE_HEIGHT, HEADER,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support, INFO by default
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(())
}

/// Merge the programs named by a configuration file
///
/// Loads `config_path`, merges both inputs and writes
/// `<output_folder>/<filename>.gcode`, returning the written path.
pub fn merge_with_config_file(
    config_path: &Path,
    output_folder: &Path,
    progress: Option<std::sync::Arc<dyn ProgressSink>>,
) -> anyhow::Result<PathBuf> {
    tracing::debug!("Loading merge config from {}", config_path.display());
    let config = Config::load_from_file(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let mut merger = HybridMerger::new(config);
    if let Some(progress) = progress {
        merger = merger.with_progress(progress);
    }

    let output = merger.merge_files().context("Failed to merge gcode")?;
    let path = output
        .write_to(output_folder)
        .with_context(|| format!("Failed to write output to {}", output_folder.display()))?;
    Ok(path)
}
