//! Configuration types for the detection pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the ground/noise filter.
///
/// The threshold lives in the sensor frame: a point survives when its `z`
/// coordinate is strictly greater than `height_threshold`. For a sensor mounted
/// `h` meters above the road the road surface sits at `z = -h`, so a threshold
/// must always be chosen with the mount height in mind. Use
/// [`FilterConfig::from_mount`] to derive it instead of guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum height (exclusive) relative to the sensor origin, in meters.
    #[serde(default = "default_height_threshold")]
    pub height_threshold: f32,
}

fn default_height_threshold() -> f32 {
    // 0.5 m above the road for the 2.0 m roof mount of the default suite
    -1.5
}

impl FilterConfig {
    /// Derive the threshold from the sensor mount height above the road and
    /// the clearance above the road that points must exceed.
    pub fn from_mount(mount_height: f32, ground_clearance: f32) -> Self {
        Self {
            height_threshold: ground_clearance - mount_height,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            height_threshold: default_height_threshold(),
        }
    }
}

/// Which DBSCAN implementation backs the clustering stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringBackend {
    /// KD-tree radius queries (`kiddo`), parallel neighbor search.
    KdTree,
    /// Uniform hash grid with cell size `eps`, no extra dependencies.
    Grid,
}

impl Default for ClusteringBackend {
    fn default() -> Self {
        ClusteringBackend::KdTree
    }
}

/// Configuration for DBSCAN clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius in meters
    #[serde(default = "default_eps")]
    pub eps: f32,

    /// Minimum neighborhood size (the point itself included) of a core point
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Clouds larger than this are subsampled before clustering
    #[serde(default = "default_clustering_max_points")]
    pub max_points: usize,

    #[serde(default)]
    pub backend: ClusteringBackend,
}

fn default_eps() -> f32 {
    0.7
}

fn default_min_samples() -> usize {
    10
}

fn default_clustering_max_points() -> usize {
    200_000
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_samples: default_min_samples(),
            max_points: default_clustering_max_points(),
            backend: ClusteringBackend::default(),
        }
    }
}

/// Heuristic used to label and score each box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPolicy {
    /// Vehicle for large boxes, pedestrian otherwise, constant score.
    SizeHeuristic,
    /// Vehicle for every box, score is the cluster point count.
    UniformVehicle,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        ClassificationPolicy::SizeHeuristic
    }
}

/// Configuration for the classification/scoring stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub policy: ClassificationPolicy,

    /// Length or width (meters) a box must exceed to be a vehicle candidate
    #[serde(default = "default_vehicle_min_footprint")]
    pub vehicle_min_footprint: f32,

    /// Volume (cubic meters) a box must exceed to be a vehicle
    #[serde(default = "default_vehicle_min_volume")]
    pub vehicle_min_volume: f32,

    /// Score attached to every detection by the size heuristic
    #[serde(default = "default_constant_score")]
    pub constant_score: f32,
}

fn default_vehicle_min_footprint() -> f32 {
    1.5
}

fn default_vehicle_min_volume() -> f32 {
    1.0
}

fn default_constant_score() -> f32 {
    0.9
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            policy: ClassificationPolicy::default(),
            vehicle_min_footprint: default_vehicle_min_footprint(),
            vehicle_min_volume: default_vehicle_min_volume(),
            constant_score: default_constant_score(),
        }
    }
}

/// Main detector configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Key of the LIDAR frame in the sensor data mapping
    #[serde(default = "default_lidar_sensor_id")]
    pub lidar_sensor_id: String,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

fn default_lidar_sensor_id() -> String {
    "LIDAR_Top".to_string()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lidar_sensor_id: default_lidar_sensor_id(),
            filter: FilterConfig::default(),
            clustering: ClusteringConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DetectorConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.filter.height_threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "filter.height_threshold",
                reason: "must be finite".to_string(),
            });
        }
        if !(self.clustering.eps.is_finite() && self.clustering.eps > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "clustering.eps",
                reason: format!("must be a positive finite radius, got {}", self.clustering.eps),
            });
        }
        if self.clustering.max_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "clustering.max_points",
                reason: "must be at least 1".to_string(),
            });
        }
        let classifier = &self.classifier;
        for (field, value) in [
            ("classifier.vehicle_min_footprint", classifier.vehicle_min_footprint),
            ("classifier.vehicle_min_volume", classifier.vehicle_min_volume),
            ("classifier.constant_score", classifier.constant_score),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be finite".to_string(),
                });
            }
        }
        if self.lidar_sensor_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lidar_sensor_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_detector_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.lidar_sensor_id, "LIDAR_Top");
        assert_eq!(config.clustering.min_samples, 10);
        assert_eq!(config.clustering.backend, ClusteringBackend::KdTree);
        assert_eq!(config.classifier.policy, ClassificationPolicy::SizeHeuristic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_filter_from_mount() {
        let filter = FilterConfig::from_mount(2.0, 0.3);
        assert!((filter.height_threshold - (-1.7)).abs() < 1e-6);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "clustering:\n  eps: 0.5\n  backend: grid\nclassifier:\n  policy: uniform_vehicle\n";
        let config: DetectorConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.clustering.eps, 0.5);
        assert_eq!(config.clustering.min_samples, 10);
        assert_eq!(config.clustering.backend, ClusteringBackend::Grid);
        assert_eq!(config.classifier.policy, ClassificationPolicy::UniformVehicle);
        assert_eq!(config.filter.height_threshold, -1.5);
    }

    #[test]
    fn test_validate_rejects_bad_eps() {
        let mut config = DetectorConfig::default();
        config.clustering.eps = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "clustering.eps", .. })
        ));

        config.clustering.eps = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("detector.yaml");

        let mut config = DetectorConfig::default();
        config.filter.height_threshold = -1.2;
        config.to_yaml(&path).unwrap();

        let loaded = DetectorConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.filter.height_threshold, -1.2);
        assert_eq!(loaded.lidar_sensor_id, config.lidar_sensor_id);
    }
}
