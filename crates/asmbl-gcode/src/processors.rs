//! G-Code line processors
//!
//! - [`offset`]: translate the X/Y/Z words of a move
//! - [`RelativeExtrusionConverter`]: rewrite absolute extrusion (`M82`) to
//!   relative extrusion (`M83`), tracking the last E value per tool

use std::collections::HashMap;

use asmbl_core::{GcodeError, Result};
use serde::{Deserialize, Serialize};

use super::{parse_line, round_to, Command, GcodeLine, LineKind, ParamValue};

/// Decimal places kept for rewritten extrusion deltas
pub const EXTRUSION_DECIMALS: i32 = 5;

/// Translate a move line by `(dx, dy, dz)`
///
/// Only axes already present on the line are shifted; missing axes are not
/// invented. Lines that are not moves are returned unchanged.
pub fn offset(line: &GcodeLine, dx: f64, dy: f64, dz: f64) -> GcodeLine {
    let mut shifted = line.clone();
    if !line.is_move() {
        return shifted;
    }

    for (axis, delta) in [('X', dx), ('Y', dy), ('Z', dz)] {
        if let Some(value) = line.param_f64(axis) {
            shifted.update_param(axis, ParamValue::Float(value + delta));
        }
    }
    shifted
}

/// Constant translation applied to every subtractive line
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoordinateOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CoordinateOffset {
    /// Create a new offset
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Apply this offset to a line
    pub fn apply(&self, line: &GcodeLine) -> GcodeLine {
        offset(line, self.x, self.y, self.z)
    }

    /// The opposite translation
    pub fn inverse(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Scan state of the extrusion normalizer
///
/// The key `None` holds the baseline for moves made before any tool was
/// selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrusionState {
    /// Source program is currently in absolute extrusion mode
    pub absolute_mode: bool,
    /// Last selected tool, e.g. `T0`
    pub current_tool: Option<String>,
    /// Last absolute E value per tool
    pub last_e: HashMap<Option<String>, f64>,
}

/// Converts absolute extrusion moves to relative ones, line by line
///
/// Output always requests relative extrusion from the firmware: `M82` is
/// rewritten to `M83` while the converter keeps tracking that the source
/// values are absolute. An absolute move for a tool with no preceding
/// `G92 E` reset fails with [`GcodeError::MissingExtrusionBaseline`], and
/// one whose `E` value is not a number with [`GcodeError::InvalidParameter`].
#[derive(Debug, Clone, Default)]
pub struct RelativeExtrusionConverter {
    state: ExtrusionState,
}

impl RelativeExtrusionConverter {
    /// Create a converter in relative mode with no tool selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scan state
    pub fn state(&self) -> &ExtrusionState {
        &self.state
    }

    /// Process one raw line
    ///
    /// Returns the replacement text when the line has to be rewritten, or
    /// `None` when the original text should be kept verbatim.
    pub fn convert_line(&mut self, raw: &str, line_number: usize) -> Result<Option<String>> {
        let Some(mut line) = parse_line(raw, false) else {
            return Ok(None);
        };

        if line.command.is('M', 82) {
            self.state.absolute_mode = true;
            line.command = Command::new('M', 83);
            return Ok(Some(line.to_gcode()));
        }

        if line.command.is('M', 83) {
            self.state.absolute_mode = false;
            return Ok(None);
        }

        if line.kind() == LineKind::ToolChange {
            self.state.current_tool = Some(line.command.to_string());
            return Ok(None);
        }

        if line.command.is('G', 92) {
            // A bare G92 zeroes every axis, E included
            let reset = if line.params.is_empty() {
                Some(0.0)
            } else {
                line.param_f64('E')
            };
            if let Some(e) = reset {
                self.state
                    .last_e
                    .insert(self.state.current_tool.clone(), e);
            }
            return Ok(None);
        }

        let is_linear_move = line.command.is('G', 0) || line.command.is('G', 1);
        if !(self.state.absolute_mode && is_linear_move) {
            return Ok(None);
        }

        let Some(param) = line.param('E') else {
            return Ok(None);
        };
        let Some(current) = param.as_f64() else {
            return Err(GcodeError::InvalidParameter {
                line_number,
                param: "E".to_string(),
                reason: format!("absolute extrusion value '{}' is not a number", param),
            }
            .into());
        };

        let tool = self.state.current_tool.clone();
        let Some(previous) = self.state.last_e.get(&tool).copied() else {
            return Err(GcodeError::MissingExtrusionBaseline { line_number, tool }.into());
        };

        line.update_param(
            'E',
            ParamValue::Float(round_to(current - previous, EXTRUSION_DECIMALS)),
        );
        self.state.last_e.insert(tool, current);
        Ok(Some(line.to_gcode()))
    }

    /// Process a whole program
    ///
    /// Line order and count are preserved; only `M82` lines and absolute
    /// extrusion moves are rewritten.
    pub fn convert(&mut self, gcode: &str) -> Result<String> {
        let mut converted = Vec::new();
        for (index, raw) in gcode.split('\n').enumerate() {
            match self.convert_line(raw, index + 1)? {
                Some(rewritten) => converted.push(rewritten),
                None => converted.push(raw.to_string()),
            }
        }
        Ok(converted.join("\n"))
    }
}

/// Convert an additive program to relative extrusion
pub fn to_relative_extrusion(gcode: &str) -> Result<String> {
    RelativeExtrusionConverter::new().convert(gcode)
}
