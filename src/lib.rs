//! Geometric LIDAR object detection.
//!
//! This crate provides:
//! - Ground suppression by height threshold in the sensor frame
//! - DBSCAN clustering behind a pluggable backend (KD-tree or hash grid)
//! - Axis-aligned box fitting with an 8-corner export
//! - Size-heuristic classification and scoring
//! - Frame loaders, CSV writers and a bird's-eye visualization
//!
//! # Example
//!
//! ```
//! use lidar_detector::sensors::lidar_frame;
//! use lidar_detector::{ClusteringBackend, Detector, DetectorConfig};
//!
//! let mut config = DetectorConfig::default();
//! config.clustering.backend = ClusteringBackend::Grid;
//! let detector = Detector::new(config).unwrap();
//!
//! // 50 returns packed in a 0.2 m cube, 5 m ahead of the sensor
//! let mut points = Vec::new();
//! for i in 0..50 {
//!     let t = i as f32 / 49.0 * 0.2;
//!     points.extend_from_slice(&[5.0 + t, (i % 5) as f32 * 0.05, (i % 3) as f32 * 0.1, 0.4]);
//! }
//!
//! let output = detector.detect(&lidar_frame("LIDAR_Top", 0, points)).unwrap();
//! assert_eq!(output.len(), 1);
//! assert_eq!(output.det_class, vec![1]);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod detector;
pub mod processors;
pub mod sensors;
pub mod visualization;

pub use config::{
    ClassificationPolicy, ClassifierConfig, ClusteringBackend, ClusteringConfig, DetectorConfig,
    FilterConfig,
};
pub use core::detection::{BoundingBox, Detection, DetectionOutput, DetectionSet, ObjectClass};
pub use core::loaders::PointCloud;
pub use detector::{DetectError, Detector};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
