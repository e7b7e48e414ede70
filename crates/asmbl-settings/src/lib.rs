//! ASMBL Settings Crate
//!
//! Handles the merge configuration: validation, derived values and
//! persistence to JSON or TOML files.

pub mod config;

pub use config::{CamSettings, Config, InputFiles, OutputSettings, PrintSettings, Printer};
