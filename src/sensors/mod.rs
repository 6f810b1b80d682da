//! Sensor rig declaration and per-frame sensor data.
//!
//! The rig is static configuration handed to whatever provisions the sensors
//! (a simulator, a recorder). It carries no logic beyond lookups. The type
//! strings match the ones the evaluation harness uses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Mount pose relative to the vehicle center: meters and degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MountPose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub roll: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub yaw: f32,
}

impl MountPose {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }
}

/// Sensor-specific parameters, tagged with the harness type string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SensorKind {
    #[serde(rename = "sensor.camera.rgb")]
    CameraRgb { width: u32, height: u32, fov: f32 },

    #[serde(rename = "sensor.lidar.ray_cast")]
    Lidar {
        range: f32,
        rotation_frequency: f32,
        channels: u32,
        upper_fov: f32,
        lower_fov: f32,
        points_per_second: u32,
    },

    #[serde(rename = "sensor.other.radar")]
    Radar {
        horizontal_fov: f32,
        vertical_fov: f32,
        range: f32,
        points_per_second: u32,
    },

    #[serde(rename = "sensor.other.gnss")]
    Gnss,
}

/// One sensor the detector asks the host to provide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub id: String,
    #[serde(flatten)]
    pub pose: MountPose,
    #[serde(flatten)]
    pub kind: SensorKind,
}

impl SensorSpec {
    pub fn new(id: &str, pose: MountPose, kind: SensorKind) -> Self {
        Self {
            id: id.to_string(),
            pose,
            kind,
        }
    }

    pub fn is_lidar(&self) -> bool {
        matches!(self.kind, SensorKind::Lidar { .. })
    }
}

fn radar(id: &str, pose: MountPose) -> SensorSpec {
    SensorSpec::new(
        id,
        pose,
        SensorKind::Radar {
            horizontal_fov: 30.0,
            vertical_fov: 30.0,
            range: 100.0,
            points_per_second: 1500,
        },
    )
}

/// The rig this detector is designed for.
///
/// A front camera for visualization, a 64-channel roof LIDAR 2 m above the
/// vehicle center, four radars facing front/back/left/right, and GNSS.
pub fn default_sensor_suite() -> Vec<SensorSpec> {
    vec![
        SensorSpec::new(
            "Camera_Front",
            MountPose::at(2.0, 0.0, 1.5),
            SensorKind::CameraRgb {
                width: 1280,
                height: 720,
                fov: 100.0,
            },
        ),
        SensorSpec::new(
            "LIDAR_Top",
            MountPose::at(0.0, 0.0, 2.0),
            SensorKind::Lidar {
                range: 50.0,
                rotation_frequency: 20.0,
                channels: 64,
                upper_fov: 4.0,
                lower_fov: -20.0,
                points_per_second: 2_304_000,
            },
        ),
        radar("RADAR_Front", MountPose::at(2.0, 0.0, 1.0)),
        radar("RADAR_Back", MountPose::at(-2.0, 0.0, 1.0).with_yaw(180.0)),
        radar("RADAR_Left", MountPose::at(0.0, -0.5, 1.0).with_yaw(-90.0)),
        radar("RADAR_Right", MountPose::at(0.0, 0.5, 1.0).with_yaw(90.0)),
        SensorSpec::new("GPS", MountPose::default(), SensorKind::Gnss),
    ]
}

/// Look up a sensor by id.
pub fn find_sensor<'a>(suite: &'a [SensorSpec], id: &str) -> Option<&'a SensorSpec> {
    suite.iter().find(|s| s.id == id)
}

/// Serialize a rig to YAML.
pub fn suite_to_yaml(suite: &[SensorSpec]) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(suite)
}

/// Parse a rig from YAML.
pub fn suite_from_yaml(yaml: &str) -> Result<Vec<SensorSpec>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Payload of one sensor for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorPayload {
    /// Row-major `(N, 4)` buffer of `x, y, z, intensity` in the sensor frame.
    Lidar(Vec<f32>),
    /// RGBA image, `height * width * 4` bytes.
    Camera { width: u32, height: u32, rgba: Vec<u8> },
    /// Radar detections as `velocity, altitude, azimuth, depth`.
    Radar(Vec<[f32; 4]>),
    /// Latitude, longitude, altitude.
    Gnss([f64; 3]),
}

/// A sensor reading tagged with the simulator frame it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub frame_id: u64,
    pub payload: SensorPayload,
}

/// All readings of one tick, keyed by sensor id.
pub type SensorData = HashMap<String, SensorFrame>;

/// Convenience for building a single-LIDAR frame.
pub fn lidar_frame(sensor_id: &str, frame_id: u64, points: Vec<f32>) -> SensorData {
    let mut data = SensorData::new();
    data.insert(
        sensor_id.to_string(),
        SensorFrame {
            frame_id,
            payload: SensorPayload::Lidar(points),
        },
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_suite_contents() {
        let suite = default_sensor_suite();
        assert_eq!(suite.len(), 7);
        assert_eq!(suite.iter().filter(|s| s.is_lidar()).count(), 1);

        let lidar = find_sensor(&suite, "LIDAR_Top").unwrap();
        assert_eq!(lidar.pose.z, 2.0);
        match lidar.kind {
            SensorKind::Lidar {
                channels,
                points_per_second,
                ..
            } => {
                assert_eq!(channels, 64);
                assert_eq!(points_per_second, 2_304_000);
            }
            ref other => panic!("unexpected kind {:?}", other),
        }

        let back = find_sensor(&suite, "RADAR_Back").unwrap();
        assert_eq!(back.pose.yaw, 180.0);
        assert!(find_sensor(&suite, "LIDAR").is_none());
    }

    #[test]
    fn test_yaml_uses_harness_type_strings() {
        let yaml = suite_to_yaml(&default_sensor_suite()).unwrap();
        assert!(yaml.contains("type: sensor.lidar.ray_cast"));
        assert!(yaml.contains("type: sensor.camera.rgb"));
        assert!(yaml.contains("id: GPS"));

        let parsed = suite_from_yaml(&yaml).unwrap();
        assert_eq!(parsed, default_sensor_suite());
    }

    #[test]
    fn test_parse_handwritten_sensor() {
        let yaml = "- type: sensor.lidar.ray_cast\n  id: LIDAR\n  x: 0.7\n  y: 0.0\n  z: 1.6\n  range: 50\n  rotation_frequency: 10\n  channels: 32\n  upper_fov: 10\n  lower_fov: -30\n  points_per_second: 56000\n";
        let suite = suite_from_yaml(yaml).unwrap();

        assert_eq!(suite.len(), 1);
        assert_eq!(suite[0].id, "LIDAR");
        assert_eq!(suite[0].pose.z, 1.6);
        assert_eq!(suite[0].pose.yaw, 0.0);
        assert!(suite[0].is_lidar());
    }

    #[test]
    fn test_lidar_frame_helper() {
        let data = lidar_frame("LIDAR_Top", 42, vec![1.0, 2.0, 3.0, 0.5]);
        let frame = &data["LIDAR_Top"];
        assert_eq!(frame.frame_id, 42);
        assert_eq!(frame.payload, SensorPayload::Lidar(vec![1.0, 2.0, 3.0, 0.5]));
    }
}
