//! Ground and noise suppression before clustering.

use crate::core::loaders::PointCloud;

/// Keep the points strictly above `height_threshold`.
///
/// The threshold is a height in the sensor frame (origin at the mount, z up),
/// so the road under a sensor mounted `h` meters high sits near `z = -h`.
/// Points with a non-finite coordinate are dropped as noise. Order and
/// intensity of the surviving points are preserved.
///
/// # Example
///
/// ```
/// use lidar_detector::core::loaders::PointCloud;
/// use lidar_detector::processors::filtering::filter_ground;
///
/// let cloud = PointCloud::from_points(&[[5.0, 0.0, -1.9, 0.1], [5.0, 0.0, -0.5, 0.3]]);
/// let kept = filter_ground(&cloud, -1.5);
/// assert_eq!(kept.z, vec![-0.5]);
/// ```
pub fn filter_ground(cloud: &PointCloud, height_threshold: f32) -> PointCloud {
    let keep: Vec<usize> = (0..cloud.len())
        .filter(|&i| {
            let (x, y, z) = (cloud.x[i], cloud.y[i], cloud.z[i]);
            x.is_finite() && y.is_finite() && z.is_finite() && z > height_threshold
        })
        .collect();

    if keep.len() == cloud.len() {
        return cloud.clone();
    }
    cloud.select(&keep)
}
