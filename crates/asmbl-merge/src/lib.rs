//! ASMBL Merge Crate
//!
//! Splits an additive program into layers and a subtractive program into
//! cutting layers, schedules every cutting layer at an additive height and
//! emits one interleaved script.

pub mod additive;
pub mod cam;
pub mod emitter;
pub mod merger;
pub mod scheduler;

pub use additive::{split_additive_layers, AdditiveLayer, AdditiveLayerKind};
pub use cam::{split_cam_operations, CamLayer, CamLine, CamSegment, OperationHeader};
pub use emitter::{
    add_retracts, emit_script, merge_and_emit, merge_layers, EmissionState, MergedLayer,
    CLEARANCE_HEIGHT, HEADER,
};
pub use merger::{HybridMerger, MergeOutput};
pub use scheduler::{
    insertion_height, schedule_insertion_heights, NonPlanarOperationGroup, ScheduleUnit,
};
