//! Additive layer splitting
//!
//! Splits a (relative-extrusion) FFF program into layers at every
//! `; layer` marker comment. Text before the first marker becomes the
//! `initialise` layer at height 0 and the final chunk becomes the `end`
//! sentinel at `+infinity`, so nothing can be scheduled after it.

use asmbl_gcode::{parse_line, parse_lines, LineKind};
use serde::{Deserialize, Serialize};

/// Comment that starts every additive layer
pub const LAYER_MARKER: &str = "; layer";

/// Comment the host injects before its parking motion
pub const PARK_MARKER: &str = "; move to park position";

/// Role of an additive layer in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditiveLayerKind {
    /// Start code before the first layer marker
    Initialise,
    /// A printed layer
    Layer,
    /// Terminal sentinel holding the end code
    End,
}

/// A contiguous span of the additive program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveLayer {
    /// Layer name parsed from the marker, or `initialise` / `end`
    pub name: String,
    /// Raw text of the layer, comments included
    pub gcode: String,
    /// Minimum Z reached by any move in the layer
    pub layer_height: f64,
    /// Role of the layer
    pub kind: AdditiveLayerKind,
}

/// Cut the host's parking motion off a chunk
fn strip_park(gcode: &str) -> &str {
    gcode.split(PARK_MARKER).next().unwrap_or_default()
}

/// Name following the marker, up to the first comma on the marker line
fn layer_name(chunk: &str) -> String {
    let first_line = chunk.lines().next().unwrap_or_default();
    let text = first_line.strip_prefix("; ").unwrap_or(first_line);
    text.split(',').next().unwrap_or_default().trim().to_string()
}

/// Z words of every move in the chunk, in order
fn move_heights(gcode: &str) -> Vec<f64> {
    parse_lines(gcode, false)
        .iter()
        .filter(|line| line.kind() == LineKind::Move)
        .filter_map(|line| line.param_f64('Z'))
        .collect()
}

/// Byte offsets at which a layer marker line starts
fn marker_offsets(gcode: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut position = 0;
    for line in gcode.split_inclusive('\n') {
        if let Some(rest) = line.strip_prefix(LAYER_MARKER) {
            // Skip header keys such as "; layerHeight" or "; layer_height"
            let next = rest.chars().next();
            if !next.is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
                offsets.push(position);
            }
        }
        position += line.len();
    }
    offsets
}

impl AdditiveLayer {
    /// Create the start-code layer
    pub fn initialise(gcode: &str) -> Self {
        Self {
            name: "initialise".to_string(),
            gcode: strip_park(gcode).to_string(),
            layer_height: 0.0,
            kind: AdditiveLayerKind::Initialise,
        }
    }

    /// Create the terminal sentinel
    pub fn end(gcode: &str) -> Self {
        Self {
            name: "end".to_string(),
            gcode: strip_park(gcode).to_string(),
            layer_height: f64::INFINITY,
            kind: AdditiveLayerKind::End,
        }
    }

    /// Create a printed layer from a marker chunk
    ///
    /// `modal_z` is used when the layer has no Z word of its own.
    pub fn from_chunk(chunk: &str, modal_z: f64) -> Self {
        let gcode = strip_park(chunk).to_string();
        let name = layer_name(&gcode);
        let layer_height = match move_heights(&gcode).into_iter().reduce(f64::min) {
            Some(height) => height,
            None => {
                tracing::warn!(
                    "Additive layer '{}' has no Z move, using modal height {}",
                    name,
                    modal_z
                );
                modal_z
            }
        };

        Self {
            name,
            gcode,
            layer_height,
            kind: AdditiveLayerKind::Layer,
        }
    }

    /// True for the start-code layer
    pub fn is_initialise(&self) -> bool {
        self.kind == AdditiveLayerKind::Initialise
    }

    /// True for the terminal sentinel
    pub fn is_end(&self) -> bool {
        self.kind == AdditiveLayerKind::End
    }

    /// Most recent tool-change command in the layer, e.g. `T0`
    pub fn last_tool(&self) -> Option<String> {
        self.gcode
            .lines()
            .filter_map(|line| parse_line(line, false))
            .filter(|line| line.kind() == LineKind::ToolChange)
            .last()
            .map(|line| line.command.to_string())
    }

    /// True when the first line after the marker is itself a tool change
    pub fn starts_with_tool_change(&self) -> bool {
        self.gcode
            .lines()
            .skip(1)
            .find(|line| !line.trim().is_empty())
            .and_then(|line| parse_line(line, false))
            .is_some_and(|line| line.kind() == LineKind::ToolChange)
    }

    /// Number of lines in the layer text
    pub fn line_count(&self) -> usize {
        self.gcode.lines().count()
    }
}

/// Split an additive program into layers
///
/// Returns `initialise` first, then one layer per marker in stream order,
/// with the final marker chunk turned into the `end` sentinel.
pub fn split_additive_layers(gcode: &str) -> Vec<AdditiveLayer> {
    let offsets = marker_offsets(gcode);
    let first = offsets.first().copied().unwrap_or(gcode.len());

    let initialise = AdditiveLayer::initialise(&gcode[..first]);
    let mut modal_z = move_heights(&initialise.gcode)
        .last()
        .copied()
        .unwrap_or(0.0);
    let mut layers = vec![initialise];

    for (index, start) in offsets.iter().enumerate() {
        let end = offsets.get(index + 1).copied().unwrap_or(gcode.len());
        let chunk = &gcode[*start..end];

        if index + 1 == offsets.len() {
            layers.push(AdditiveLayer::end(chunk));
            continue;
        }

        let layer = AdditiveLayer::from_chunk(chunk, modal_z);
        if let Some(last) = move_heights(&layer.gcode).last() {
            modal_z = *last;
        }
        tracing::debug!(
            "Additive layer '{}' at height {}",
            layer.name,
            layer.layer_height
        );
        layers.push(layer);
    }

    layers
}
