//! Merge and tool-change emission
//!
//! Wraps every cam layer in retract moves, interleaves the additive and cam
//! layers by height and writes the final script with the tool changes each
//! layer needs.

use asmbl_core::{Result, ScheduleError};
use asmbl_gcode::{round_to, GcodeLine, ParamValue};
use serde::{Deserialize, Serialize};

use crate::additive::AdditiveLayer;
use crate::cam::{CamLayer, CamLine};

/// First line of every merged script
pub const HEADER: &str = "; ASMBL gcode created by https://github.com/AndyEveritt/ASMBL\n";

/// Default Z clearance of the retract moves around a cam layer (mm)
pub const CLEARANCE_HEIGHT: f64 = 5.0;

/// A layer of the merged program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergedLayer {
    Additive(AdditiveLayer),
    Cam(CamLayer),
}

impl MergedLayer {
    /// Height the layer is ordered by
    pub fn height(&self) -> f64 {
        match self {
            Self::Additive(layer) => layer.layer_height,
            Self::Cam(layer) => layer.insertion_height.unwrap_or(f64::INFINITY),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Additive(layer) => &layer.name,
            Self::Cam(layer) => &layer.name,
        }
    }

    pub fn gcode(&self) -> &str {
        match self {
            Self::Additive(layer) => &layer.gcode,
            Self::Cam(layer) => &layer.gcode,
        }
    }

    fn is_initialise(&self) -> bool {
        matches!(self, Self::Additive(layer) if layer.is_initialise())
    }
}

/// Copy of `line` raised by `clearance` in Z
fn retract_line(line: &CamLine, clearance: f64) -> GcodeLine {
    let mut retract = line.line.clone();
    if let Some(z) = line.z {
        retract.set_param('Z', ParamValue::Float(round_to(z + clearance, 6)));
    }
    retract
}

/// Bracket a cam layer's G-code with retract moves
///
/// The pre-retract sits `clearance` above the first motion line, the
/// post-retract `clearance` above the last one.
pub fn add_retracts(layer: &CamLayer, clearance: f64) -> String {
    let moves: Vec<&CamLine> = layer.lines().filter(|line| line.line.is_move()).collect();
    let (Some(first), Some(last)) = (moves.first(), moves.last()) else {
        return layer.gcode.clone();
    };

    format!(
        "; retract\n{}\n{}; retract\n{}\n",
        retract_line(first, clearance).to_gcode(),
        layer.gcode,
        retract_line(last, clearance).to_gcode()
    )
}

/// Interleave additive and scheduled cam layers by height
///
/// Cam layers are wrapped with retracts first. The sort is stable, so an
/// additive layer precedes a cam layer inserted at the same height.
pub fn merge_layers(
    additive_layers: Vec<AdditiveLayer>,
    cam_layers: Vec<CamLayer>,
    clearance: f64,
) -> Result<Vec<MergedLayer>> {
    let mut merged: Vec<MergedLayer> = additive_layers.into_iter().map(MergedLayer::Additive).collect();

    for mut layer in cam_layers {
        if layer.insertion_height.is_none() {
            return Err(ScheduleError::Unscheduled { layer: layer.name }.into());
        }
        layer.gcode = add_retracts(&layer, clearance);
        merged.push(MergedLayer::Cam(layer));
    }

    merged.sort_by(|a, b| a.height().total_cmp(&b.height()));
    Ok(merged)
}

/// Tool bookkeeping while walking the merged layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmissionState {
    /// Most recent tool selected by the additive program
    pub last_additive_tool: Option<String>,
}

impl EmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tool an additive layer left selected
    fn observe(&mut self, layer: &MergedLayer) {
        if let MergedLayer::Additive(additive) = layer {
            if let Some(tool) = additive.last_tool() {
                self.last_additive_tool = Some(tool);
            }
        }
    }

    /// Tool-change line to emit before `layer`, if any
    ///
    /// Every cam layer restates its tool. An additive layer gets the last
    /// additive tool back unless it borders `initialise` or opens with its
    /// own tool change.
    fn tool_change(&self, layer: &MergedLayer, previous: &MergedLayer) -> Option<String> {
        match layer {
            MergedLayer::Cam(cam) => Some(cam.tool.clone()),
            MergedLayer::Additive(additive) => {
                if additive.is_initialise() || previous.is_initialise() {
                    return None;
                }
                if additive.starts_with_tool_change() {
                    return None;
                }
                self.last_additive_tool.clone()
            }
        }
    }
}

/// Append a block, keeping it on its own line
fn push_block(script: &mut String, block: &str) {
    if !script.is_empty() && !script.ends_with('\n') {
        script.push('\n');
    }
    script.push_str(block);
}

/// Concatenate the merged layers into the final script
pub fn emit_script(layers: &[MergedLayer]) -> String {
    let mut script = HEADER.to_string();
    let mut state = EmissionState::new();
    let Some(mut previous) = layers.first() else {
        return script;
    };

    for layer in layers {
        state.observe(previous);
        if let Some(tool) = state.tool_change(layer, previous) {
            tracing::debug!("Tool change to {} before '{}'", tool, layer.name());
            push_block(&mut script, &format!("{}\n", tool));
        }
        push_block(&mut script, layer.gcode());
        previous = layer;
    }

    script
}

/// Merge both layer lists and emit the script in one step
pub fn merge_and_emit(
    additive_layers: Vec<AdditiveLayer>,
    cam_layers: Vec<CamLayer>,
) -> Result<String> {
    let merged = merge_layers(additive_layers, cam_layers, CLEARANCE_HEIGHT)?;
    Ok(emit_script(&merged))
}
