//! Detection data model: boxes, class labels and the harness-facing output.

use serde::{Deserialize, Serialize};

/// Sign pattern of the corners in one face, counter-clockwise seen from above
/// starting at the (-x, -y) corner.
const FACE_SIGNS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Coarse object classes understood by the evaluation harness.
///
/// The discriminants are the integer codes written to `det_class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Vehicle = 0,
    Pedestrian = 1,
    Cyclist = 2,
}

impl ObjectClass {
    /// Integer code used in the output arrays.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Inverse of [`ObjectClass::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ObjectClass::Vehicle),
            1 => Some(ObjectClass::Pedestrian),
            2 => Some(ObjectClass::Cyclist),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::Vehicle => "vehicle",
            ObjectClass::Pedestrian => "pedestrian",
            ObjectClass::Cyclist => "cyclist",
        }
    }
}

/// Axis-aligned box in the sensor frame.
///
/// The canonical form is `(center, half_extents)`; the eight corners are
/// always derived from it, so the two views can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub center: [f32; 3],
    pub half_extents: [f32; 3],
}

impl BoundingBox {
    pub fn new(center: [f32; 3], half_extents: [f32; 3]) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// Box spanning the per-axis `min` and `max`.
    pub fn from_min_max(min: [f32; 3], max: [f32; 3]) -> Self {
        let mut center = [0.0f32; 3];
        let mut half_extents = [0.0f32; 3];
        for axis in 0..3 {
            center[axis] = (min[axis] + max[axis]) * 0.5;
            half_extents[axis] = (max[axis] - min[axis]) * 0.5;
        }
        Self {
            center,
            half_extents,
        }
    }

    /// Recover the box from its eight corners (any order).
    pub fn from_corners(corners: &[[f32; 3]; 8]) -> Self {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for corner in corners {
            for axis in 0..3 {
                min[axis] = min[axis].min(corner[axis]);
                max[axis] = max[axis].max(corner[axis]);
            }
        }
        Self::from_min_max(min, max)
    }

    pub fn min(&self) -> [f32; 3] {
        [
            self.center[0] - self.half_extents[0],
            self.center[1] - self.half_extents[1],
            self.center[2] - self.half_extents[2],
        ]
    }

    pub fn max(&self) -> [f32; 3] {
        [
            self.center[0] + self.half_extents[0],
            self.center[1] + self.half_extents[1],
            self.center[2] + self.half_extents[2],
        ]
    }

    /// Full extent along x (forward).
    #[inline]
    pub fn length(&self) -> f32 {
        2.0 * self.half_extents[0]
    }

    /// Full extent along y (lateral).
    #[inline]
    pub fn width(&self) -> f32 {
        2.0 * self.half_extents[1]
    }

    /// Full extent along z (up).
    #[inline]
    pub fn height(&self) -> f32 {
        2.0 * self.half_extents[2]
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.length() * self.width() * self.height()
    }

    /// The eight corners: bottom face first, then the top face, each face in
    /// the order (-x,-y), (+x,-y), (+x,+y), (-x,+y). Corner `i + 4` sits
    /// directly above corner `i`.
    pub fn corners(&self) -> [[f32; 3]; 8] {
        let [cx, cy, cz] = self.center;
        let [hx, hy, hz] = self.half_extents;
        let mut corners = [[0.0f32; 3]; 8];
        for (face, dz) in [-hz, hz].into_iter().enumerate() {
            for (i, [sx, sy]) in FACE_SIGNS.iter().enumerate() {
                corners[face * 4 + i] = [cx + sx * hx, cy + sy * hy, cz + dz];
            }
        }
        corners
    }

    /// True when `point` lies inside or on the box.
    pub fn contains(&self, point: [f32; 3]) -> bool {
        (0..3).all(|axis| (point[axis] - self.center[axis]).abs() <= self.half_extents[axis])
    }
}

/// One detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: ObjectClass,
    /// Heuristic confidence. Not a calibrated probability.
    pub score: f32,
    /// Number of cluster points the box was built from.
    pub point_count: usize,
}

/// All detections of one call, in cluster order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn push(&mut self, detection: Detection) {
        self.detections.push(detection);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    /// Number of detections per class, indexed by class code.
    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for det in &self.detections {
            counts[det.class.code() as usize] += 1;
        }
        counts
    }

    /// Flatten into the parallel arrays the harness consumes.
    pub fn to_output(&self) -> DetectionOutput {
        DetectionOutput {
            det_boxes: self.detections.iter().map(|d| d.bbox.corners()).collect(),
            det_class: self.detections.iter().map(|d| d.class.code()).collect(),
            det_score: self.detections.iter().map(|d| d.score).collect(),
        }
    }
}

impl FromIterator<Detection> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self {
            detections: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

/// Harness-facing result of one detection call.
///
/// All three fields are always present and indexed by detection: `det_boxes`
/// is `M x 8 x 3`, `det_class` and `det_score` are one-dimensional of length
/// `M`. An empty result is three empty vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    pub det_boxes: Vec<[[f32; 3]; 8]>,
    pub det_class: Vec<i32>,
    pub det_score: Vec<f32>,
}

impl DetectionOutput {
    #[inline]
    pub fn len(&self) -> usize {
        self.det_boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.det_boxes.is_empty()
    }

    /// True when the three arrays describe the same number of detections.
    pub fn is_consistent(&self) -> bool {
        self.det_class.len() == self.det_boxes.len() && self.det_score.len() == self.det_boxes.len()
    }
}

impl From<&DetectionSet> for DetectionOutput {
    fn from(set: &DetectionSet) -> Self {
        set.to_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_box() -> BoundingBox {
        BoundingBox::new([10.0, -2.0, -0.8], [2.2, 0.9, 0.7])
    }

    #[test]
    fn test_corner_ordering() {
        let b = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 2.0, 3.0]);
        let c = b.corners();

        assert_eq!(c[0], [-1.0, -2.0, -3.0]);
        assert_eq!(c[1], [1.0, -2.0, -3.0]);
        assert_eq!(c[2], [1.0, 2.0, -3.0]);
        assert_eq!(c[3], [-1.0, 2.0, -3.0]);

        for i in 0..4 {
            assert_eq!(c[i + 4][0], c[i][0]);
            assert_eq!(c[i + 4][1], c[i][1]);
            assert_eq!(c[i + 4][2], 3.0);
        }
    }

    #[test]
    fn test_corners_reproduce_box() {
        let b = sample_box();
        let back = BoundingBox::from_corners(&b.corners());

        for axis in 0..3 {
            assert_approx_eq!(back.center[axis], b.center[axis], 1e-5);
            assert_approx_eq!(back.half_extents[axis], b.half_extents[axis], 1e-5);
        }
    }

    #[test]
    fn test_dimensions() {
        let b = sample_box();
        assert_approx_eq!(b.length(), 4.4, 1e-5);
        assert_approx_eq!(b.width(), 1.8, 1e-5);
        assert_approx_eq!(b.height(), 1.4, 1e-5);
        assert_approx_eq!(b.volume(), 4.4 * 1.8 * 1.4, 1e-4);
        assert!(b.contains([11.0, -2.5, -0.2]));
        assert!(!b.contains([13.0, -2.0, -0.8]));
    }

    #[test]
    fn test_flat_box_is_valid() {
        let b = BoundingBox::from_min_max([0.0, 0.0, 1.0], [2.0, 1.0, 1.0]);
        assert_eq!(b.half_extents[2], 0.0);
        assert_eq!(b.volume(), 0.0);
        let c = b.corners();
        assert_eq!(c[0][2], c[4][2]);
    }

    #[test]
    fn test_class_codes() {
        for class in [ObjectClass::Vehicle, ObjectClass::Pedestrian, ObjectClass::Cyclist] {
            assert_eq!(ObjectClass::from_code(class.code()), Some(class));
        }
        assert_eq!(ObjectClass::Cyclist.code(), 2);
        assert_eq!(ObjectClass::from_code(3), None);
    }

    #[test]
    fn test_output_shape() {
        let set: DetectionSet = vec![
            Detection {
                bbox: sample_box(),
                class: ObjectClass::Vehicle,
                score: 0.9,
                point_count: 120,
            },
            Detection {
                bbox: BoundingBox::new([3.0, 1.0, -1.0], [0.3, 0.3, 0.9]),
                class: ObjectClass::Pedestrian,
                score: 0.9,
                point_count: 40,
            },
        ]
        .into_iter()
        .collect();

        let out = set.to_output();
        assert!(out.is_consistent());
        assert_eq!(out.len(), 2);
        assert_eq!(out.det_boxes[0].len(), 8);
        assert_eq!(out.det_class, vec![0, 1]);
        assert_eq!(out.det_score, vec![0.9, 0.9]);
        assert_eq!(set.class_counts(), [1, 1, 0]);
    }

    #[test]
    fn test_empty_output_keeps_all_fields() {
        let out = DetectionSet::new().to_output();
        assert!(out.is_empty());
        assert!(out.is_consistent());

        let yaml = serde_yaml::to_string(&out).unwrap();
        assert!(yaml.contains("det_boxes"));
        assert!(yaml.contains("det_class"));
        assert!(yaml.contains("det_score"));
    }
}
