//! Axis-aligned box extraction from clusters.

use crate::core::detection::BoundingBox;
use crate::core::transforms::coords_min_max;

/// Fit the axis-aligned box of one cluster.
///
/// Returns `None` when the cluster holds fewer than `min_samples` points
/// (border assignment can leave a cluster smaller than its core neighborhood)
/// or is empty. A cluster flattened onto a plane or line yields a box with
/// zero thickness on those axes.
pub fn extract_box(points: &[[f32; 3]], min_samples: usize) -> Option<BoundingBox> {
    if points.len() < min_samples.max(1) {
        return None;
    }
    let (min, max) = coords_min_max(points)?;
    Some(BoundingBox::from_min_max(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_extract_box() {
        let points = vec![[1.0, 2.0, -1.0], [3.0, 2.5, 0.0], [2.0, 4.0, -0.5]];
        let bbox = extract_box(&points, 3).unwrap();

        assert_approx_eq!(bbox.center[0], 2.0);
        assert_approx_eq!(bbox.center[1], 3.0);
        assert_approx_eq!(bbox.center[2], -0.5);
        assert_approx_eq!(bbox.half_extents[0], 1.0);
        assert_approx_eq!(bbox.half_extents[1], 1.0);
        assert_approx_eq!(bbox.half_extents[2], 0.5);

        for p in &points {
            assert!(bbox.contains(*p));
        }
    }

    #[test]
    fn test_small_cluster_rejected() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        assert!(extract_box(&points, 3).is_none());
        assert!(extract_box(&[], 0).is_none());
    }

    #[test]
    fn test_degenerate_cluster() {
        let points = vec![[0.0, 0.0, 1.0], [2.0, 0.0, 1.0], [1.0, 0.0, 1.0]];
        let bbox = extract_box(&points, 2).unwrap();
        assert_eq!(bbox.half_extents[1], 0.0);
        assert_eq!(bbox.half_extents[2], 0.0);
        assert_approx_eq!(bbox.half_extents[0], 1.0);
    }
}
