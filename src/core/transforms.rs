//! Point cloud reductions applied before clustering.

use super::loaders::PointCloud;

/// Subsample a point cloud to at most `max_points` using a seeded shuffle.
///
/// If the cloud has no more than `max_points` points, returns a copy of the
/// original with stride factor 1. The selection is deterministic for a given
/// cloud size and keeps the original point order.
///
/// # Returns
///
/// Tuple of (subsampled_cloud, stride_factor) where stride_factor is the
/// approximate reduction ratio (ceiling of n/max_points)
pub fn subsample_cloud(cloud: &PointCloud, max_points: usize) -> (PointCloud, usize) {
    let n = cloud.len();

    if n <= max_points {
        return (cloud.clone(), 1);
    }
    if max_points == 0 {
        return (PointCloud::new(), n);
    }

    let stride_factor = (n + max_points - 1) / max_points;

    let mut indices: Vec<usize> = (0..n).collect();

    // Partial Fisher-Yates with a fixed-seed LCG so repeated calls agree
    let mut state: u64 = 12345;
    for i in 0..max_points {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = i + ((state >> 33) as usize % (n - i));
        indices.swap(i, j);
    }

    indices.truncate(max_points);
    indices.sort_unstable();

    (cloud.select(&indices), stride_factor)
}

/// Per-axis minimum and maximum of a set of coordinates.
///
/// Returns `None` for an empty slice.
pub fn coords_min_max(coords: &[[f32; 3]]) -> Option<([f32; 3], [f32; 3])> {
    let first = coords.first()?;
    let mut min = *first;
    let mut max = *first;

    for c in &coords[1..] {
        for axis in 0..3 {
            if c[axis] < min[axis] {
                min[axis] = c[axis];
            }
            if c[axis] > max[axis] {
                max[axis] = c[axis];
            }
        }
    }

    Some((min, max))
}
