//! Detection pipeline stages and frame batch processing.

pub mod boxes;
pub mod classification;
pub mod clustering;
pub mod filtering;
pub mod frames;

// Re-export key types for convenience
pub use boxes::extract_box;
pub use classification::{build_classifier, Classifier, SizeHeuristic, UniformVehicle};
#[cfg(feature = "kdtree")]
pub use clustering::KdTreeDbscan;
pub use clustering::{build_clusterer, group_by_label, Clusterer, GridDbscan, NOISE};
pub use filtering::filter_ground;
pub use frames::{find_frames, process_frame_file, FrameOutput};
