//! Layer-height scheduling
//!
//! Assigns every [`CamLayer`] the additive height after which it runs.
//! Each cut is delayed until the next cut's material exists, plus
//! `layer_overlap` additive layers of margin:
//!
//! 1. Consecutive non-planar layers of one operation form a
//!    [`NonPlanarOperationGroup`] that is scheduled as a single unit.
//! 2. Units from all operations are pooled and sorted by cutting height.
//! 3. Each unit is placed relative to the next higher unit, or above the
//!    print when it is the highest.
//! 4. Groups are expanded back into their member layers.

use asmbl_core::{Result, ScheduleError};

use crate::additive::AdditiveLayer;
use crate::cam::CamLayer;

/// Extra height given to the highest cut when no print layer is above it (mm)
pub const FINAL_CUT_MARGIN: f64 = 10.0;

/// A run of consecutive non-planar layers scheduled together
#[derive(Debug, Clone, PartialEq)]
pub struct NonPlanarOperationGroup {
    pub layers: Vec<CamLayer>,
    /// Max cutting height over the members
    pub cutting_height: f64,
}

impl NonPlanarOperationGroup {
    fn new(layers: Vec<CamLayer>) -> Self {
        let cutting_height = layers
            .iter()
            .map(|layer| layer.cutting_height)
            .fold(f64::NEG_INFINITY, f64::max);
        Self {
            layers,
            cutting_height,
        }
    }
}

/// One schedulable unit
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleUnit {
    Planar(CamLayer),
    NonPlanar(NonPlanarOperationGroup),
}

impl ScheduleUnit {
    pub fn cutting_height(&self) -> f64 {
        match self {
            Self::Planar(layer) => layer.cutting_height,
            Self::NonPlanar(group) => group.cutting_height,
        }
    }

    /// Name used in logs and errors
    pub fn name(&self) -> &str {
        match self {
            Self::Planar(layer) => &layer.name,
            Self::NonPlanar(group) => group
                .layers
                .first()
                .map(|layer| layer.name.as_str())
                .unwrap_or_default(),
        }
    }

    /// Expand into cam layers carrying `insertion_height`
    fn into_layers(self, insertion_height: f64) -> Vec<CamLayer> {
        let mut layers = match self {
            Self::Planar(layer) => vec![layer],
            Self::NonPlanar(group) => group.layers,
        };
        for layer in &mut layers {
            layer.insertion_height = Some(insertion_height);
        }
        layers
    }
}

/// Group consecutive non-planar layers of one operation
pub fn coalesce_operation(layers: Vec<CamLayer>) -> Vec<ScheduleUnit> {
    let mut units = Vec::new();
    let mut run: Vec<CamLayer> = Vec::new();

    for layer in layers {
        if layer.planar {
            if !run.is_empty() {
                units.push(ScheduleUnit::NonPlanar(NonPlanarOperationGroup::new(
                    std::mem::take(&mut run),
                )));
            }
            units.push(ScheduleUnit::Planar(layer));
        } else {
            run.push(layer);
        }
    }
    if !run.is_empty() {
        units.push(ScheduleUnit::NonPlanar(NonPlanarOperationGroup::new(run)));
    }

    units
}

/// Height of the `overlap`-th additive layer above `floor`, or of the
/// last one when fewer exist
fn overlap_height(additive_heights: &[f64], floor: f64, overlap: u32) -> Option<f64> {
    let later: Vec<f64> = additive_heights
        .iter()
        .copied()
        .filter(|height| *height > floor)
        .collect();
    let nth = usize::try_from(overlap).ok()?.checked_sub(1)?;
    later.get(nth).or(later.last()).copied()
}

/// Insertion height of a unit cutting at `cutting_height`
///
/// `next_height` is the lowest cutting height strictly above this unit,
/// `additive_heights` the sorted heights of every additive layer except the
/// end sentinel.
pub fn insertion_height(
    cutting_height: f64,
    next_height: Option<f64>,
    additive_heights: &[f64],
    layer_overlap: u32,
) -> f64 {
    match next_height {
        Some(next) => overlap_height(additive_heights, next, layer_overlap).unwrap_or(next),
        None => overlap_height(additive_heights, cutting_height, layer_overlap)
            .unwrap_or(cutting_height + FINAL_CUT_MARGIN),
    }
}

/// Assign insertion heights to every cam layer
///
/// Returns the layers ordered by the cutting height of their unit; equal
/// heights keep operation order.
pub fn schedule_insertion_heights(
    operations: Vec<Vec<CamLayer>>,
    additive_layers: &[AdditiveLayer],
    layer_overlap: u32,
) -> Result<Vec<CamLayer>> {
    let mut units: Vec<ScheduleUnit> = operations.into_iter().flat_map(coalesce_operation).collect();
    units.sort_by(|a, b| a.cutting_height().total_cmp(&b.cutting_height()));

    let mut additive_heights: Vec<f64> = additive_layers
        .iter()
        .filter(|layer| !layer.is_end())
        .map(|layer| layer.layer_height)
        .collect();
    additive_heights.sort_by(f64::total_cmp);

    let cutting_heights: Vec<f64> = units.iter().map(ScheduleUnit::cutting_height).collect();

    let mut scheduled = Vec::new();
    for unit in units {
        let cutting_height = unit.cutting_height();
        let next_height = cutting_heights
            .iter()
            .copied()
            .find(|height| *height > cutting_height);
        let height = insertion_height(cutting_height, next_height, &additive_heights, layer_overlap);

        if !height.is_finite() {
            return Err(ScheduleError::InfiniteInsertionHeight {
                layer: unit.name().to_string(),
                cutting_height,
            }
            .into());
        }

        tracing::debug!(
            "Scheduled '{}' (cutting {}) at additive height {}",
            unit.name(),
            cutting_height,
            height
        );
        scheduled.extend(unit.into_layers(height));
    }

    Ok(scheduled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::additive::AdditiveLayerKind;

    fn cam(name: &str, cutting_height: f64, planar: bool) -> CamLayer {
        CamLayer {
            name: name.to_string(),
            strategy: "face".to_string(),
            tool: "T2".to_string(),
            segments: Vec::new(),
            cutting_height,
            planar,
            insertion_height: None,
            gcode: String::new(),
        }
    }

    fn additive(heights: &[f64]) -> Vec<AdditiveLayer> {
        let mut layers = vec![AdditiveLayer::initialise("")];
        for (index, height) in heights.iter().enumerate() {
            layers.push(AdditiveLayer {
                name: format!("layer {}", index + 1),
                gcode: String::new(),
                layer_height: *height,
                kind: AdditiveLayerKind::Layer,
            });
        }
        layers.push(AdditiveLayer::end(""));
        layers
    }

    #[test]
    fn test_coalesce_non_planar_runs() {
        let units = coalesce_operation(vec![
            cam("a", 1.0, true),
            cam("b", 2.0, false),
            cam("c", 3.5, false),
            cam("d", 4.0, true),
            cam("e", 5.0, false),
        ]);
        assert_eq!(units.len(), 4);
        assert!(matches!(units[0], ScheduleUnit::Planar(_)));
        match &units[1] {
            ScheduleUnit::NonPlanar(group) => {
                assert_eq!(group.layers.len(), 2);
                assert_eq!(group.cutting_height, 3.5);
            }
            other => panic!("expected a non-planar group, got {:?}", other),
        }
        assert_eq!(units[3].cutting_height(), 5.0);
    }

    #[test]
    fn test_overlap_count_rule() {
        let heights = [0.2, 0.4, 0.6, 0.8, 1.0, 1.2];
        assert_eq!(insertion_height(0.2, Some(0.6), &heights, 0), 0.6);
        assert_eq!(insertion_height(0.2, Some(0.6), &heights, 1), 0.8);
        assert_eq!(insertion_height(0.2, Some(0.6), &heights, 2), 1.0);
        // fewer later layers than the overlap: last one
        assert_eq!(insertion_height(0.2, Some(0.6), &heights, 10), 1.2);
        // no later layers: the next cut height
        assert_eq!(insertion_height(0.2, Some(1.2), &heights, 2), 1.2);
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_highest_unit() {
        let heights = [0.2, 0.4, 0.6];
        assert_close(insertion_height(0.6, None, &heights, 2), 10.6);
        assert_eq!(insertion_height(0.2, None, &heights, 1), 0.4);
        assert_close(insertion_height(0.2, None, &heights, 0), 10.2);
    }

    #[test]
    fn test_end_sentinel_never_used() {
        let layers = additive(&[0.2, 0.4]);
        let scheduled =
            schedule_insertion_heights(vec![vec![cam("top", 0.4, true)]], &layers, 3).unwrap();
        assert_close(scheduled[0].insertion_height.unwrap(), 10.4);
    }

    #[test]
    fn test_pooled_units_sorted_across_operations() {
        let layers = additive(&[0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        let operations = vec![
            vec![cam("pocket", 2.0, true), cam("pocket", 1.0, true)],
            vec![cam("contour", 1.5, true)],
        ];
        let scheduled = schedule_insertion_heights(operations, &layers, 1).unwrap();

        let order: Vec<f64> = scheduled.iter().map(|l| l.cutting_height).collect();
        assert_eq!(order, vec![1.0, 1.5, 2.0]);
        assert_eq!(scheduled[0].insertion_height, Some(2.0));
        assert_eq!(scheduled[1].insertion_height, Some(2.5));
        assert_eq!(scheduled[2].insertion_height, Some(2.5));
    }

    #[test]
    fn test_group_members_share_insertion_height() {
        let layers = additive(&[0.5, 1.0, 1.5, 2.0, 2.5]);
        let operations = vec![vec![
            cam("adaptive", 1.0, false),
            cam("adaptive", 2.0, false),
            cam("finish", 2.5, true),
        ]];
        let scheduled = schedule_insertion_heights(operations, &layers, 0).unwrap();
        assert_eq!(scheduled.len(), 3);
        assert_eq!(scheduled[0].insertion_height, Some(2.5));
        assert_eq!(scheduled[1].insertion_height, Some(2.5));
        assert_eq!(scheduled[2].insertion_height, Some(12.5));
    }

    #[test]
    fn test_equal_heights_keep_input_order() {
        let layers = additive(&[1.0, 2.0]);
        let operations = vec![vec![cam("first", 1.0, true)], vec![cam("second", 1.0, true)]];
        let scheduled = schedule_insertion_heights(operations, &layers, 1).unwrap();
        assert_eq!(scheduled[0].name, "first");
        assert_eq!(scheduled[1].name, "second");
        assert_eq!(scheduled[0].insertion_height, scheduled[1].insertion_height);
    }

    #[test]
    fn test_infinite_height_is_fatal() {
        let layers = additive(&[0.2]);
        let err = schedule_insertion_heights(vec![vec![cam("broken", f64::INFINITY, true)]], &layers, 1)
            .unwrap_err();
        assert!(err.is_schedule_error());
        assert!(err.to_string().contains("broken"));
    }
}
