//! Top-level merge pipeline
//!
//! [`HybridMerger`] runs the whole transform over two in-memory programs:
//! normalize extrusion, split the additive layers, split and offset the CAM
//! operations, schedule them, merge and emit. Each phase is reported to
//! `tracing` and to the optional [`ProgressSink`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asmbl_core::{ProgressSink, Result};
use asmbl_gcode::{to_relative_extrusion, CoordinateOffset};
use asmbl_settings::{Config, OutputSettings};

use crate::additive::{split_additive_layers, AdditiveLayer};
use crate::cam::{split_cam_operations, CamLayer};
use crate::emitter::{emit_script, merge_layers, MergedLayer, CLEARANCE_HEIGHT};
use crate::scheduler::schedule_insertion_heights;

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Additive layers in stream order, extrusion already relative
    pub additive_layers: Vec<AdditiveLayer>,
    /// Cam layers with their insertion heights, in scheduling order
    pub cam_layers: Vec<CamLayer>,
    /// Final layer order of the script
    pub layers: Vec<MergedLayer>,
    /// The merged program
    pub script: String,
    output: OutputSettings,
}

impl MergeOutput {
    /// Write the script to `<folder>/<filename>.gcode`
    ///
    /// The folder is created if it does not exist.
    pub fn write_to(&self, folder: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(folder)?;
        let path = self.output.output_path(folder);
        std::fs::write(&path, &self.script)?;
        tracing::info!("Wrote merged gcode to {}", path.display());
        Ok(path)
    }
}

/// Merges an additive and a subtractive program into one script
pub struct HybridMerger {
    config: Config,
    progress: Option<Arc<dyn ProgressSink>>,
    clearance_height: f64,
}

impl HybridMerger {
    /// Create a merger with no progress reporting
    pub fn new(config: Config) -> Self {
        Self {
            config,
            progress: None,
            clearance_height: CLEARANCE_HEIGHT,
        }
    }

    /// Report phase boundaries to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Override the retract clearance height (mm)
    pub fn with_clearance_height(mut self, clearance_height: f64) -> Self {
        self.clearance_height = clearance_height;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn phase(&self, message: &str) {
        tracing::info!("{}", message);
        if let Some(progress) = &self.progress {
            progress.message(message);
            progress.increment();
        }
    }

    /// Read both programs named in the configuration and merge them
    pub fn merge_files(&self) -> Result<MergeOutput> {
        self.phase("Opening files");
        let additive = std::fs::read_to_string(&self.config.input_files.additive_gcode)?;
        let subtractive = std::fs::read_to_string(&self.config.input_files.subtractive_gcode)?;
        tracing::debug!(
            "Read {} bytes of additive and {} bytes of subtractive gcode",
            additive.len(),
            subtractive.len()
        );
        self.merge(&additive, &subtractive)
    }

    /// Merge two programs held in memory
    pub fn merge(&self, additive: &str, subtractive: &str) -> Result<MergeOutput> {
        self.config.validate()?;
        let additive = additive.replace("\r\n", "\n");
        let subtractive = subtractive.replace("\r\n", "\n");

        self.phase("Converting additive gcode to relative extrusion");
        let additive = to_relative_extrusion(&additive)?;

        self.phase("Splitting additive gcode layers");
        let additive_layers = split_additive_layers(&additive);

        self.phase("Splitting subtractive gcode layers");
        let (x, y, z) = self.config.subtractive_offset();
        let operations = split_cam_operations(&subtractive, CoordinateOffset::new(x, y, z))?;

        self.phase("Ordering subtractive gcode layers");
        let cam_layers = schedule_insertion_heights(
            operations,
            &additive_layers,
            self.config.cam_settings.layer_overlap,
        )?;

        self.phase("Merging gcode layers");
        let layers = merge_layers(
            additive_layers.clone(),
            cam_layers.clone(),
            self.clearance_height,
        )?;

        self.phase("Creating gcode script");
        let script = emit_script(&layers);

        tracing::info!(
            "Merged {} additive layers with {} CAM layers",
            additive_layers.len(),
            cam_layers.len()
        );

        Ok(MergeOutput {
            additive_layers,
            cam_layers,
            layers,
            script,
            output: self.config.output_settings.clone(),
        })
    }
}

impl std::fmt::Debug for HybridMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridMerger")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .field("clearance_height", &self.clearance_height)
            .finish()
    }
}
