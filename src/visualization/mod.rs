//! Bird's-eye-view plots of LIDAR frames and their detections.
//!
//! Points are drawn as an x/y scatter in the sensor frame; detections are
//! drawn as their box footprint, colored by class.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::detection::{DetectionSet, ObjectClass};
use crate::core::loaders::PointCloud;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty point cloud")]
    EmptyPointCloud,

    #[error("{coords} coordinates but {labels} labels")]
    LengthMismatch { coords: usize, labels: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Gray for ground returns and noise.
const NOISE_COLOR: (u8, u8, u8) = (170, 170, 170);

/// Cornflower blue for points above the ground threshold.
const POINT_COLOR: (u8, u8, u8) = (100, 149, 237);

fn class_color(class: ObjectClass) -> RGBColor {
    match class {
        ObjectClass::Vehicle => RGBColor(228, 26, 28),
        ObjectClass::Pedestrian => RGBColor(77, 175, 74),
        ObjectClass::Cyclist => RGBColor(255, 127, 0),
    }
}

/// Footprint rectangle: min corner, max corner, outline color.
type Footprint = ([f32; 2], [f32; 2], RGBColor);

/// Plot a frame and its detections from above and save as PNG.
///
/// Points at or below `height_threshold` (when given) are drawn gray. Every
/// detection is drawn as its x/y footprint.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `cloud` - The frame to draw
/// * `detections` - Boxes to overlay
/// * `height_threshold` - Ground threshold used by the detector
/// * `max_points` - Maximum number of points to plot (subsamples if exceeded)
pub fn plot_detections(
    output_path: &Path,
    cloud: &PointCloud,
    detections: &DetectionSet,
    height_threshold: Option<f32>,
    max_points: usize,
) -> Result<()> {
    if cloud.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }

    let n = cloud.len();
    let step = plot_step(n, max_points);
    let ground = RGBAColor(NOISE_COLOR.0, NOISE_COLOR.1, NOISE_COLOR.2, 0.4);
    let above = RGBAColor(POINT_COLOR.0, POINT_COLOR.1, POINT_COLOR.2, 0.7);

    let points: Vec<(f32, f32, RGBAColor)> = (0..n)
        .step_by(step)
        .filter(|&i| cloud.x[i].is_finite() && cloud.y[i].is_finite())
        .map(|i| {
            let is_ground = height_threshold.map_or(false, |t| cloud.z[i] <= t);
            (cloud.x[i], cloud.y[i], if is_ground { ground } else { above })
        })
        .collect();

    let footprints: Vec<Footprint> = detections
        .iter()
        .map(|det| {
            let (min, max) = (det.bbox.min(), det.bbox.max());
            ([min[0], min[1]], [max[0], max[1]], class_color(det.class))
        })
        .collect();

    render(output_path, &points, &footprints)
}

/// Plot a labeled point cloud from above with colors by cluster.
pub fn plot_labeled_cloud(
    output_path: &Path,
    coords: &[[f32; 3]],
    labels: &[i32],
    max_points: usize,
) -> Result<()> {
    if coords.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }
    if coords.len() != labels.len() {
        return Err(VisualizationError::LengthMismatch {
            coords: coords.len(),
            labels: labels.len(),
        });
    }

    let step = plot_step(coords.len(), max_points);
    let points: Vec<(f32, f32, RGBAColor)> = (0..coords.len())
        .step_by(step)
        .map(|i| {
            let c = if labels[i] < 0 {
                NOISE_COLOR
            } else {
                CLUSTER_COLORS[labels[i] as usize % CLUSTER_COLORS.len()]
            };
            (coords[i][0], coords[i][1], RGBAColor(c.0, c.1, c.2, 1.0))
        })
        .collect();

    render(output_path, &points, &[])
}

fn plot_step(n: usize, max_points: usize) -> usize {
    if max_points > 0 && n > max_points {
        n / max_points
    } else {
        1
    }
}

fn render(output_path: &Path, points: &[(f32, f32, RGBAColor)], footprints: &[Footprint]) -> Result<()> {
    if points.is_empty() && footprints.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }

    let (x_min, x_max, y_min, y_max) = compute_bounds(points, footprints);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("x [m]")
        .y_desc("y [m]")
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(points.iter().map(|(x, y, color)| {
            Circle::new((*x, *y), 2, color.filled())
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(footprints.iter().map(|(min, max, color)| {
            Rectangle::new([(min[0], min[1]), (max[0], max[1])], color.stroke_width(2))
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Compute the x/y bounds of the points and footprints.
fn compute_bounds(points: &[(f32, f32, RGBAColor)], footprints: &[Footprint]) -> (f32, f32, f32, f32) {
    let mut x_min = f32::MAX;
    let mut x_max = f32::MIN;
    let mut y_min = f32::MAX;
    let mut y_max = f32::MIN;

    let corners = footprints
        .iter()
        .flat_map(|(min, max, _)| [(min[0], min[1]), (max[0], max[1])]);
    for (x, y) in points.iter().map(|(x, y, _)| (*x, *y)).chain(corners) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < f32::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f32::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_cloud_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("frame.png");

        let result = plot_detections(&path, &PointCloud::new(), &DetectionSet::new(), None, 1000);
        assert!(matches!(result, Err(VisualizationError::EmptyPointCloud)));
        assert!(!path.exists());
    }

    #[test]
    fn test_plot_detections_writes_png() {
        use crate::core::detection::{BoundingBox, Detection};

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plots").join("frame.png");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let cloud = PointCloud::from_points(&[
            [5.0, 0.0, 0.0, 0.5],
            [5.2, 0.2, 0.1, 0.5],
            [8.0, -1.0, -1.9, 0.1],
        ]);
        let detections: DetectionSet = vec![Detection {
            bbox: BoundingBox::from_min_max([5.0, 0.0, 0.0], [5.2, 0.2, 0.1]),
            class: ObjectClass::Pedestrian,
            score: 0.9,
            point_count: 2,
        }]
        .into_iter()
        .collect();

        plot_detections(&path, &cloud, &detections, Some(-1.5), 1000).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_label_length_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("labels.png");

        let result = plot_labeled_cloud(&path, &[[0.0, 0.0, 0.0], [1.0, 1.0, 0.0]], &[0], 1000);
        assert!(matches!(
            result,
            Err(VisualizationError::LengthMismatch { coords: 2, labels: 1 })
        ));
    }

    #[test]
    fn test_bounds_cover_footprints() {
        let points = vec![(0.0, 0.0, RGBAColor(0, 0, 0, 1.0)), (2.0, 1.0, RGBAColor(0, 0, 0, 1.0))];
        let footprints = vec![([5.0, -3.0], [6.0, -2.0], RGBColor(0, 0, 0))];

        assert_eq!(compute_bounds(&points, &footprints), (0.0, 6.0, -3.0, 1.0));
    }

    #[test]
    fn test_bounds_pad_degenerate_axis() {
        let points = vec![(3.0, 4.0, RGBAColor(0, 0, 0, 1.0))];
        assert_eq!(compute_bounds(&points, &[]), (2.0, 4.0, 3.0, 5.0));
    }

    #[test]
    fn test_plot_step() {
        assert_eq!(plot_step(100, 1000), 1);
        assert_eq!(plot_step(5000, 1000), 5);
        assert_eq!(plot_step(5000, 0), 1);
    }
}
