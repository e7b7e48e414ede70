//! Subtractive operation segmenting
//!
//! A CAM program is a sequence of operations separated by blank lines. Each
//! operation starts with three header lines (name, `(strategy: ...)` and the
//! tool command) followed by motion annotated with `(type: ...)` comments:
//!
//! ```text
//! (Face1)
//! (strategy: face)
//! T2
//! (type: lead in)
//! G1 X0 Y0 Z1.0
//! (type: cutting)
//! G1 X10 Y0 Z0.5
//! ```
//!
//! Lines are typed, grouped into [`CamSegment`]s, and the cutting segments
//! are merged into atomic [`CamLayer`]s by height.

use asmbl_core::{GcodeError, Result};
use asmbl_gcode::{parse_line, round_to, CoordinateOffset, GcodeLine};
use serde::{Deserialize, Serialize};

/// Height spread above which a cutting segment is non-planar (mm)
pub const PLANAR_THRESHOLD: f64 = 0.05;

/// Segment type tags used by the CAM post-processor
pub mod segment_type {
    pub const CUTTING: &str = "cutting";
    pub const LEAD_IN: &str = "lead in";
    pub const LEAD_OUT: &str = "lead out";
    pub const PLUNGE: &str = "plunge";
}

/// One motion line of a CAM operation, already offset into the print frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamLine {
    pub line: GcodeLine,
    /// Modal Z of the tool after this line; `None` for non-moves and
    /// for moves made before any Z was known
    pub z: Option<f64>,
    /// Type tag from the most recent `(type: ...)` comment
    pub line_type: Option<String>,
}

impl CamLine {
    pub fn to_gcode(&self) -> String {
        self.line.to_gcode()
    }
}

/// A maximal run of consecutive lines sharing one type tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamSegment {
    /// Position of the segment within its operation
    pub index: usize,
    pub segment_type: Option<String>,
    pub lines: Vec<CamLine>,
    /// Representative height, only computed for cutting segments
    pub height: Option<f64>,
    /// Planarity, only computed for cutting segments
    pub planar: Option<bool>,
}

impl CamSegment {
    /// Build a segment, classifying it when it is a cutting segment
    ///
    /// A planar segment is represented by its minimum Z, a non-planar one
    /// by its maximum Z.
    pub fn new(
        index: usize,
        segment_type: Option<String>,
        lines: Vec<CamLine>,
        operation: &str,
    ) -> Result<Self> {
        let mut segment = Self {
            index,
            segment_type,
            lines,
            height: None,
            planar: None,
        };

        if segment.is_type(segment_type::CUTTING) {
            let heights: Vec<f64> = segment
                .lines
                .iter()
                .filter(|line| line.line.is_move())
                .filter_map(|line| line.z)
                .collect();

            let (Some(min), Some(max)) = (
                heights.iter().copied().reduce(f64::min),
                heights.iter().copied().reduce(f64::max),
            ) else {
                return Err(GcodeError::MissingCuttingHeight {
                    operation: operation.to_string(),
                }
                .into());
            };

            if round_to(max - min, 6) > PLANAR_THRESHOLD {
                segment.height = Some(max);
                segment.planar = Some(false);
            } else {
                segment.height = Some(min);
                segment.planar = Some(true);
            }
        }

        Ok(segment)
    }

    /// Check the segment's type tag
    pub fn is_type(&self, tag: &str) -> bool {
        self.segment_type.as_deref() == Some(tag)
    }

    pub fn is_cutting(&self) -> bool {
        self.is_type(segment_type::CUTTING)
    }
}

/// One atomic, mergeable cutting unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamLayer {
    /// Operation name from the header
    pub name: String,
    /// Milling strategy from the header
    pub strategy: String,
    /// Tool-change command from the header
    pub tool: String,
    pub segments: Vec<CamSegment>,
    /// Max height over the cutting segments
    pub cutting_height: f64,
    /// False when any member segment is non-planar
    pub planar: bool,
    /// Additive height after which this layer runs, set by the scheduler
    pub insertion_height: Option<f64>,
    /// Serialized lines, one per line with a trailing newline
    pub gcode: String,
}

impl CamLayer {
    /// Materialize a layer from its segments
    ///
    /// Returns `None` when no segment is a cutting segment.
    pub fn new(header: &OperationHeader, segments: Vec<CamSegment>) -> Option<Self> {
        let cutting_height = segments
            .iter()
            .filter(|segment| segment.is_cutting())
            .filter_map(|segment| segment.height)
            .reduce(f64::max)?;
        let planar = segments.iter().all(|segment| segment.planar != Some(false));
        let gcode = segments
            .iter()
            .flat_map(|segment| &segment.lines)
            .map(|line| format!("{}\n", line.to_gcode()))
            .collect();

        Some(Self {
            name: header.name.clone(),
            strategy: header.strategy.clone(),
            tool: header.tool.clone(),
            segments,
            cutting_height,
            planar,
            insertion_height: None,
            gcode,
        })
    }

    /// All lines of the layer in order
    pub fn lines(&self) -> impl Iterator<Item = &CamLine> {
        self.segments.iter().flat_map(|segment| &segment.lines)
    }
}

/// Header metadata of one CAM operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHeader {
    pub name: String,
    pub strategy: String,
    pub tool: String,
}

impl OperationHeader {
    /// Parse the three header lines
    fn parse(name: &str, strategy: &str, tool: &str) -> Self {
        let strategy = strategy.trim();
        let strategy = strategy
            .strip_prefix("(strategy:")
            .unwrap_or(strategy)
            .trim_end_matches(')')
            .trim();

        Self {
            name: name.trim().to_string(),
            strategy: strategy.to_string(),
            tool: tool.trim().to_string(),
        }
    }
}

/// Split on blank lines, dropping empty blocks
fn operation_blocks(gcode: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in gcode.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Tag motion lines with the current `(type: ...)` and offset them
pub fn assign_line_types(lines: &[&str], offset: CoordinateOffset) -> Vec<CamLine> {
    let mut current_type: Option<String> = None;
    let mut modal_z: Option<f64> = None;
    let mut typed = Vec::new();

    for raw in lines {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix("(type:") {
            current_type = Some(rest.trim_end_matches(')').trim().to_string());
            continue;
        }
        if trimmed.starts_with('(') {
            continue;
        }

        let Some(parsed) = parse_line(raw, false) else {
            continue;
        };
        let line = offset.apply(&parsed);
        let z = if line.is_move() {
            if let Some(z) = line.param_f64('Z') {
                modal_z = Some(z);
            }
            modal_z
        } else {
            None
        };

        typed.push(CamLine {
            line,
            z,
            line_type: current_type.clone(),
        });
    }

    typed
}

/// Collapse consecutive lines of the same type into segments
pub fn group_cam_lines(lines: Vec<CamLine>, operation: &str) -> Result<Vec<CamSegment>> {
    let mut segments = Vec::new();
    let mut run: Vec<CamLine> = Vec::new();

    for line in lines {
        if run
            .last()
            .is_some_and(|previous| previous.line_type != line.line_type)
        {
            let segment_type = run[0].line_type.clone();
            segments.push(CamSegment::new(
                segments.len(),
                segment_type,
                std::mem::take(&mut run),
                operation,
            )?);
        }
        run.push(line);
    }

    if let Some(first) = run.first() {
        let segment_type = first.line_type.clone();
        segments.push(CamSegment::new(segments.len(), segment_type, run, operation)?);
    }

    Ok(segments)
}

/// Slice of `segments` covering a cutting group plus its lead in/out
fn with_lead_in_out(segments: &[CamSegment], group: &[usize]) -> Vec<CamSegment> {
    let (Some(&first), Some(&last)) = (group.first(), group.last()) else {
        return Vec::new();
    };

    let start = match first.checked_sub(1).and_then(|index| segments.get(index)) {
        Some(previous)
            if previous.is_type(segment_type::LEAD_IN) || previous.is_type(segment_type::PLUNGE) =>
        {
            first - 1
        }
        _ => first,
    };
    let end = match segments.get(last + 1) {
        Some(next) if next.is_type(segment_type::LEAD_OUT) => last + 1,
        _ => last,
    };

    segments[start..=end].to_vec()
}

/// Merge cutting segments into layers by height
///
/// A planar segment at a new height starts a new layer; a non-planar
/// segment always joins the current one. Segments between two grouped
/// cutting segments (links, retracts) stay inside the layer.
pub fn group_cam_segments(header: &OperationHeader, segments: &[CamSegment]) -> Vec<CamLayer> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_height: Option<f64> = None;

    for segment in segments.iter().filter(|segment| segment.is_cutting()) {
        let joins_current = !groups.is_empty()
            && (segment.height == group_height || segment.planar == Some(false));
        if joins_current {
            if let Some(group) = groups.last_mut() {
                group.push(segment.index);
            }
        } else {
            groups.push(vec![segment.index]);
        }
        // compared against the most recent cutting segment, not the group's first
        group_height = segment.height;
    }

    groups
        .iter()
        .filter_map(|group| CamLayer::new(header, with_lead_in_out(segments, group)))
        .inspect(|layer| {
            tracing::debug!(
                "CAM layer '{}' cutting at {} ({})",
                layer.name,
                layer.cutting_height,
                if layer.planar { "planar" } else { "non-planar" }
            );
        })
        .collect()
}

/// Split a CAM program into operations of cutting layers
///
/// Every motion line is translated by `offset`. Operations with a
/// truncated header or no cutting motion produce no layers.
pub fn split_cam_operations(gcode: &str, offset: CoordinateOffset) -> Result<Vec<Vec<CamLayer>>> {
    let mut operations = Vec::new();

    for block in operation_blocks(gcode) {
        let [name, strategy, tool, body @ ..] = block.as_slice() else {
            tracing::warn!("Skipping CAM block with an incomplete header: {:?}", block);
            continue;
        };
        let header = OperationHeader::parse(name, strategy, tool);

        let lines = assign_line_types(body, offset);
        let segments = group_cam_lines(lines, &header.name)?;
        let layers = group_cam_segments(&header, &segments);

        if layers.is_empty() {
            tracing::warn!("CAM operation '{}' has no cutting motion", header.name);
            continue;
        }
        tracing::debug!(
            "CAM operation '{}' ({}) split into {} layers",
            header.name,
            header.strategy,
            layers.len()
        );
        operations.push(layers);
    }

    Ok(operations)
}
