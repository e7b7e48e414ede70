// Scheduler and splitter property tests

use asmbl_merge::{
    schedule_insertion_heights, split_additive_layers, AdditiveLayerKind, CamLayer,
};
use proptest::prelude::*;

fn planar_cam(index: usize, cutting_height: f64) -> CamLayer {
    CamLayer {
        name: format!("op{}", index),
        strategy: "face".to_string(),
        tool: "T2".to_string(),
        segments: Vec::new(),
        cutting_height,
        planar: true,
        insertion_height: None,
        gcode: String::new(),
    }
}

/// Additive program with one layer per step, heights accumulating
fn additive_program(steps: &[u32]) -> String {
    let mut gcode = String::from("M83\nT0\n");
    let mut height = 0u32;
    for (index, step) in steps.iter().enumerate() {
        height += step;
        let z = f64::from(height) / 100.0;
        gcode.push_str(&format!("; layer {}, Z = {}\nG1 Z{}\nG1 X1 E0.1\n", index + 1, z, z));
    }
    gcode.push_str("; layer end\nM84\n");
    gcode
}

proptest! {
    #[test]
    fn additive_heights_never_decrease(steps in prop::collection::vec(0u32..40, 1..30)) {
        let layers = split_additive_layers(&additive_program(&steps));

        prop_assert_eq!(layers.first().map(|l| l.kind), Some(AdditiveLayerKind::Initialise));
        prop_assert_eq!(layers[0].layer_height, 0.0);
        prop_assert_eq!(layers.last().map(|l| l.kind), Some(AdditiveLayerKind::End));
        prop_assert!(layers.last().map(|l| l.layer_height.is_infinite()).unwrap_or(false));
        prop_assert_eq!(layers.len(), steps.len() + 2);
        for pair in layers.windows(2) {
            prop_assert!(pair[0].layer_height <= pair[1].layer_height);
        }
    }

    #[test]
    fn zero_overlap_schedules_at_next_cut(
        steps in prop::collection::vec(1u32..40, 1..20),
        cuts in prop::collection::vec(0u32..800, 1..12),
    ) {
        let additive = split_additive_layers(&additive_program(&steps));
        let operations: Vec<Vec<CamLayer>> = cuts
            .iter()
            .enumerate()
            .map(|(index, cut)| vec![planar_cam(index, f64::from(*cut) / 100.0)])
            .collect();
        let heights: Vec<f64> = cuts.iter().map(|cut| f64::from(*cut) / 100.0).collect();

        let scheduled = schedule_insertion_heights(operations, &additive, 0).unwrap();
        prop_assert_eq!(scheduled.len(), cuts.len());

        for layer in &scheduled {
            let insertion = layer.insertion_height.unwrap();
            prop_assert!(insertion.is_finite());

            let next = heights
                .iter()
                .copied()
                .filter(|height| *height > layer.cutting_height)
                .reduce(f64::min);
            match next {
                Some(next) => prop_assert_eq!(insertion, next),
                None => prop_assert_eq!(insertion, layer.cutting_height + 10.0),
            }
        }
    }

    #[test]
    fn insertion_never_infinite(
        steps in prop::collection::vec(1u32..40, 0..20),
        cuts in prop::collection::vec(0u32..800, 1..12),
        overlap in 0u32..6,
    ) {
        let additive = split_additive_layers(&additive_program(&steps));
        let operations = vec![cuts
            .iter()
            .enumerate()
            .map(|(index, cut)| planar_cam(index, f64::from(*cut) / 100.0))
            .collect()];

        let scheduled = schedule_insertion_heights(operations, &additive, overlap).unwrap();
        let mut previous = f64::NEG_INFINITY;
        for layer in &scheduled {
            prop_assert!(layer.insertion_height.unwrap().is_finite());
            prop_assert!(layer.insertion_height.unwrap() >= layer.cutting_height);
            prop_assert!(layer.cutting_height >= previous);
            previous = layer.cutting_height;
        }
    }
}
