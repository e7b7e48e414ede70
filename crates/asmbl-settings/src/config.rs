//! Merge configuration for ASMBL
//!
//! Configuration is organized into the same groups the host integrations
//! and JSON configuration files use:
//! - Input files (additive and subtractive G-code paths)
//! - Printer (bed centre used to align the subtractive toolpath)
//! - Print settings (raft height)
//! - CAM settings (layer overlap and layer dropdown)
//! - Output settings (output file name)
//!
//! Every field is required; defaults are the caller's concern.

use asmbl_core::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths of the two source programs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFiles {
    /// FFF program produced by the slicer
    pub additive_gcode: PathBuf,
    /// Milling program produced by the CAM post-processor
    pub subtractive_gcode: PathBuf,
}

/// Printer geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    /// Bed centre X in printer coordinates (mm)
    pub bed_centre_x: f64,
    /// Bed centre Y in printer coordinates (mm)
    pub bed_centre_y: f64,
}

/// Print settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintSettings {
    /// Height of the printed raft the part sits on (mm)
    pub raft_height: f64,
}

/// CAM scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamSettings {
    /// Number of additive layers each cutting layer is delayed by
    pub layer_overlap: u32,
    /// Distance the whole subtractive toolpath is lowered by (mm)
    pub layer_dropdown: f64,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// File name of the merged program, without the `.gcode` extension
    pub filename: String,
}

impl OutputSettings {
    /// Path of the merged program inside `folder`
    pub fn output_path(&self, folder: &Path) -> PathBuf {
        folder.join(format!("{}.gcode", self.filename.trim()))
    }
}

/// Complete merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Source program paths
    #[serde(rename = "InputFiles")]
    pub input_files: InputFiles,
    /// Printer geometry
    #[serde(rename = "Printer")]
    pub printer: Printer,
    /// Print settings
    #[serde(rename = "PrintSettings")]
    pub print_settings: PrintSettings,
    /// CAM settings
    #[serde(rename = "CamSettings")]
    pub cam_settings: CamSettings,
    /// Output settings
    #[serde(rename = "OutputSettings")]
    pub output_settings: OutputSettings,
}

fn ensure_finite(key: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("must be a finite number, got {}", value),
        }
        .into())
    }
}

impl Config {
    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&content)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("Invalid TOML config: {}", e)))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a JSON configuration document
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Invalid JSON config: {}", e)))?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)
                .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()).into());
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        ensure_finite("Printer.bed_centre_x", self.printer.bed_centre_x)?;
        ensure_finite("Printer.bed_centre_y", self.printer.bed_centre_y)?;
        ensure_finite("PrintSettings.raft_height", self.print_settings.raft_height)?;
        ensure_finite("CamSettings.layer_dropdown", self.cam_settings.layer_dropdown)?;

        if self.cam_settings.layer_dropdown < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "CamSettings.layer_dropdown".to_string(),
                reason: "must be >= 0".to_string(),
            }
            .into());
        }

        let filename = self.output_settings.filename.trim();
        if filename.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "OutputSettings.filename".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if filename.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                key: "OutputSettings.filename".to_string(),
                reason: "must be a file name, not a path".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Translation applied to every subtractive line
    ///
    /// The additive program is assumed to be aligned already; the milling
    /// program is moved to the bed centre and raised by the raft, less the
    /// configured dropdown.
    pub fn subtractive_offset(&self) -> (f64, f64, f64) {
        (
            self.printer.bed_centre_x,
            self.printer.bed_centre_y,
            self.print_settings.raft_height - self.cam_settings.layer_dropdown,
        )
    }

    /// Path of the merged program inside `folder`
    pub fn output_path(&self, folder: &Path) -> PathBuf {
        self.output_settings.output_path(folder)
    }
}
