//! Core data types and I/O operations.

pub mod detection;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use detection::{BoundingBox, Detection, DetectionOutput, DetectionSet, ObjectClass};
pub use loaders::{load_cloud, PointCloud};
pub use writers::{write_detections_csv, write_labels_csv, WriteError};
