//! The LIDAR object detector: filter, cluster, box, classify.
//!
//! # Example
//!
//! ```
//! use lidar_detector::{Detector, DetectorConfig};
//! use lidar_detector::sensors::lidar_frame;
//!
//! let detector = Detector::new(DetectorConfig::default()).unwrap();
//! let data = lidar_frame("LIDAR_Top", 0, Vec::new());
//! let output = detector.detect(&data).unwrap();
//! assert!(output.is_empty());
//! ```

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{ConfigError, DetectorConfig};
use crate::core::detection::{Detection, DetectionOutput, DetectionSet};
use crate::core::loaders::{PointCloud, POINT_WIDTH};
use crate::core::transforms::subsample_cloud;
use crate::processors::boxes::extract_box;
use crate::processors::classification::{build_classifier, Classifier};
use crate::processors::clustering::{build_clusterer, group_by_label, Clusterer};
use crate::processors::filtering::filter_ground;
use crate::sensors::{default_sensor_suite, find_sensor, SensorData, SensorPayload, SensorSpec};

/// Errors that escape a detection call.
///
/// Absent or sparse data is never an error; only malformed input is.
#[derive(Error, Debug, PartialEq)]
pub enum DetectError {
    #[error("malformed LIDAR buffer from '{sensor}': {len} values is not a multiple of {width}")]
    MalformedPoints {
        sensor: String,
        len: usize,
        width: usize,
    },
}

/// Whether the detector can run, fixed at construction.
enum State {
    Ready(Box<dyn Clusterer>),
    Disabled,
}

/// Geometric object detector for a single LIDAR.
///
/// Holds only read-only state, so one instance can serve concurrent calls.
pub struct Detector {
    config: DetectorConfig,
    state: State,
    classifier: Box<dyn Classifier>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("config", &self.config)
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl Detector {
    /// Build a detector from configuration.
    ///
    /// If the configured clustering backend is not compiled into this build
    /// the detector starts disabled and every call returns no detections.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let clusterer = build_clusterer(config.clustering.backend);
        if clusterer.is_none() {
            warn!(
                "clustering backend {:?} is not available in this build; detector disabled",
                config.clustering.backend
            );
        }
        let classifier = build_classifier(&config.classifier);
        Ok(Self::assemble(config, clusterer, classifier))
    }

    /// Build a detector from explicit parts, e.g. a custom backend or a fake
    /// classifier. `clusterer = None` yields a disabled detector.
    pub fn with_parts(
        config: DetectorConfig,
        clusterer: Option<Box<dyn Clusterer>>,
        classifier: Box<dyn Classifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if clusterer.is_none() {
            warn!("no clustering backend supplied; detector disabled");
        }
        Ok(Self::assemble(config, clusterer, classifier))
    }

    fn assemble(
        config: DetectorConfig,
        clusterer: Option<Box<dyn Clusterer>>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        let state = match clusterer {
            Some(c) => {
                info!(
                    "detector ready: backend={} eps={} min_samples={} height_threshold={}",
                    c.name(),
                    config.clustering.eps,
                    config.clustering.min_samples,
                    config.filter.height_threshold
                );
                State::Ready(c)
            }
            None => State::Disabled,
        };
        Self {
            config,
            state,
            classifier,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Name of the active clustering backend, `None` when disabled.
    pub fn backend_name(&self) -> Option<&'static str> {
        match &self.state {
            State::Ready(c) => Some(c.name()),
            State::Disabled => None,
        }
    }

    /// Sensors the host must provide for this detector.
    pub fn sensors(&self) -> Vec<SensorSpec> {
        default_sensor_suite()
    }

    /// Mount height of the configured LIDAR in the declared rig, if present.
    pub fn lidar_mount_height(&self) -> Option<f32> {
        let suite = self.sensors();
        find_sensor(&suite, &self.config.lidar_sensor_id).map(|s| s.pose.z)
    }

    /// Run detection on one tick of sensor data.
    ///
    /// A missing LIDAR entry, or a non-LIDAR payload under the LIDAR key,
    /// yields an empty output.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::MalformedPoints`] when the LIDAR buffer length
    /// is not a multiple of 4.
    pub fn detect(&self, data: &SensorData) -> Result<DetectionOutput, DetectError> {
        let sensor_id = &self.config.lidar_sensor_id;
        let frame = match data.get(sensor_id) {
            Some(frame) => frame,
            None => {
                debug!("no '{}' entry in sensor data", sensor_id);
                return Ok(DetectionOutput::default());
            }
        };

        let values = match &frame.payload {
            SensorPayload::Lidar(values) => values,
            _ => {
                debug!("'{}' frame {} is not a LIDAR payload", sensor_id, frame.frame_id);
                return Ok(DetectionOutput::default());
            }
        };

        let cloud = PointCloud::from_flat(values).ok_or_else(|| DetectError::MalformedPoints {
            sensor: sensor_id.clone(),
            len: values.len(),
            width: POINT_WIDTH,
        })?;

        let detections = self.detect_cloud(&cloud);
        debug!(
            "frame {}: {} points -> {} detections",
            frame.frame_id,
            cloud.len(),
            detections.len()
        );
        Ok(detections.to_output())
    }

    /// Filter, subsample and cluster a cloud.
    ///
    /// Returns the clustered coordinates with one label per point, or `None`
    /// when the detector is disabled or too few points survive the filter.
    /// Clouds above `max_points` are clustered on a subsample, so boxes and
    /// point counts built from them cover only the sampled points.
    pub fn cluster_labels(&self, cloud: &PointCloud) -> Option<(Vec<[f32; 3]>, Vec<i32>)> {
        let clusterer = match &self.state {
            State::Ready(c) => c,
            State::Disabled => return None,
        };
        let cfg = &self.config.clustering;

        let filtered = filter_ground(cloud, self.config.filter.height_threshold);
        if filtered.len() < cfg.min_samples || filtered.is_empty() {
            debug!(
                "{} of {} points above threshold, below min_samples={}",
                filtered.len(),
                cloud.len(),
                cfg.min_samples
            );
            return None;
        }

        let (filtered, stride) = subsample_cloud(&filtered, cfg.max_points);
        if stride > 1 {
            debug!(
                "subsampled to {} points (approx stride={}); box extents and point counts are approximate",
                filtered.len(),
                stride
            );
        }

        let coords = filtered.to_coords();
        let labels = clusterer.cluster(&coords, cfg.eps, cfg.min_samples);
        Some((coords, labels))
    }

    /// Run the four pipeline stages on a point cloud.
    pub fn detect_cloud(&self, cloud: &PointCloud) -> DetectionSet {
        match self.cluster_labels(cloud) {
            Some((coords, labels)) => self.boxes_from_labels(&coords, &labels),
            None => DetectionSet::new(),
        }
    }

    /// Like [`Detector::detect_cloud`], also handing back the per-point
    /// labels of the single clustering pass.
    pub fn detect_with_labels(
        &self,
        cloud: &PointCloud,
    ) -> (DetectionSet, Option<(Vec<[f32; 3]>, Vec<i32>)>) {
        match self.cluster_labels(cloud) {
            Some((coords, labels)) => {
                let detections = self.boxes_from_labels(&coords, &labels);
                (detections, Some((coords, labels)))
            }
            None => (DetectionSet::new(), None),
        }
    }

    fn boxes_from_labels(&self, coords: &[[f32; 3]], labels: &[i32]) -> DetectionSet {
        let min_samples = self.config.clustering.min_samples;

        let mut detections = DetectionSet::new();
        for members in group_by_label(labels) {
            let points: Vec<[f32; 3]> = members.iter().map(|&i| coords[i]).collect();
            let Some(bbox) = extract_box(&points, min_samples) else {
                continue;
            };
            let (class, score) = self.classifier.classify(&bbox, points.len());
            detections.push(Detection {
                bbox,
                class,
                score,
                point_count: points.len(),
            });
        }

        detections
    }
}
