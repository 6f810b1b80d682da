//! Offline processing of recorded LIDAR frames.
//!
//! A recording is a directory of per-frame files (`*.csv` or `*.ply`) whose
//! names end in the frame number, e.g. `lidar_000042.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;

use crate::core::detection::DetectionSet;
use crate::core::loaders::{load_cloud, CloudFormat};
use crate::core::writers::{write_detections_csv, write_labels_csv};
use crate::detector::Detector;

/// Result of running the detector over one frame file.
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub frame_id: u64,
    pub source: PathBuf,
    pub detections_path: PathBuf,
    /// Only written on request and when the frame had enough points to cluster.
    pub labels_path: Option<PathBuf>,
    pub points: usize,
    pub detections: DetectionSet,
}

fn frame_pattern() -> Result<Regex> {
    // Last run of digits in the file stem
    Ok(Regex::new(r"(\d+)\D*$")?)
}

fn frame_number(pattern: &Regex, path: &Path) -> Option<u64> {
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    pattern.captures(stem)?.get(1)?.as_str().parse().ok()
}

/// Discover the frame files in a directory, ordered by frame number.
///
/// Only CSV and PLY files whose name carries a frame number are returned.
/// When two files share a number, the one whose path sorts first wins.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn find_frames(directory: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let pattern = frame_pattern()?;

    let mut paths: Vec<PathBuf> = fs::read_dir(directory)
        .with_context(|| format!("failed to read frame directory {}", directory.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && CloudFormat::from_path(path).is_some())
        .collect();
    paths.sort();

    let mut frames: Vec<(u64, PathBuf)> = Vec::with_capacity(paths.len());
    for path in paths {
        match frame_number(&pattern, &path) {
            Some(id) if frames.iter().all(|(existing, _)| *existing != id) => frames.push((id, path)),
            Some(id) => debug!("skipping {}: frame {} already seen", path.display(), id),
            None => debug!("skipping {}: no frame number in name", path.display()),
        }
    }

    frames.sort_by_key(|(id, _)| *id);
    Ok(frames)
}

/// Run the detector over one frame file and write the results.
///
/// Detections go to `<stem>_detections.csv`; with `write_labels` the
/// per-point cluster labels go to `<stem>_labels.csv`. Outputs land in
/// `output_dir`, or next to the input when it is `None`.
///
/// # Errors
///
/// Returns an error if the frame cannot be loaded or an output cannot be
/// written.
pub fn process_frame_file(
    path: &Path,
    detector: &Detector,
    output_dir: Option<&Path>,
    write_labels: bool,
) -> Result<FrameOutput> {
    let cloud = load_cloud(path).with_context(|| format!("failed to load {}", path.display()))?;
    let frame_id = frame_pattern()
        .ok()
        .and_then(|pattern| frame_number(&pattern, path))
        .unwrap_or(0);

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    info!("{}: {} points", file_name, cloud.len());

    let (detections, labeled) = if write_labels {
        detector.detect_with_labels(&cloud)
    } else {
        (detector.detect_cloud(&cloud), None)
    };
    info!(
        "{}: {} detections (vehicle/pedestrian/cyclist = {:?})",
        file_name,
        detections.len(),
        detections.class_counts()
    );

    let out_dir = output_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| path.parent().unwrap_or(Path::new(".")).to_path_buf());
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");

    let detections_path = out_dir.join(format!("{}_detections.csv", stem));
    write_detections_csv(&detections_path, &detections)?;
    info!("Detections CSV -> {}", detections_path.display());

    let labels_path = match labeled {
        Some((coords, labels)) => {
            let labels_path = out_dir.join(format!("{}_labels.csv", stem));
            write_labels_csv(&labels_path, &coords, &labels)?;
            info!("Labels CSV -> {}", labels_path.display());
            Some(labels_path)
        }
        None => None,
    };

    Ok(FrameOutput {
        frame_id,
        source: path.to_path_buf(),
        detections_path,
        labels_path,
        points: cloud.len(),
        detections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusteringBackend, DetectorConfig};
    use crate::core::detection::ObjectClass;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Default configuration on a backend every build provides.
    fn grid_detector() -> Detector {
        let mut config = DetectorConfig::default();
        config.clustering.backend = ClusteringBackend::Grid;
        Detector::new(config).unwrap()
    }

    fn write_frame_csv(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "x,y,z,intensity").unwrap();
        // 5 x 5 x 2 lattice, 0.05 m spacing, plus two ground returns
        for i in 0..5 {
            for j in 0..5 {
                for k in 0..2 {
                    writeln!(file, "{},{},{},0.5", 6.0 + i as f32 * 0.05, j as f32 * 0.05, k as f32 * 0.05)
                        .unwrap();
                }
            }
        }
        writeln!(file, "6.0,0.0,-1.9,0.1").unwrap();
        writeln!(file, "7.0,1.0,-1.95,0.1").unwrap();
        path
    }

    #[test]
    fn test_find_frames_orders_by_number() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        File::create(dir.join("lidar_000012.csv")).unwrap();
        File::create(dir.join("lidar_3.ply")).unwrap();
        File::create(dir.join("lidar_100.csv")).unwrap();
        File::create(dir.join("notes_7.txt")).unwrap();
        File::create(dir.join("summary.csv")).unwrap();

        let frames = find_frames(dir).unwrap();
        let ids: Vec<u64> = frames.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![3, 12, 100]);
        assert!(frames[0].1.ends_with("lidar_3.ply"));
    }

    #[test]
    fn test_find_frames_skips_duplicate_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        File::create(dir.join("a_5.csv")).unwrap();
        File::create(dir.join("b_5.csv")).unwrap();

        let frames = find_frames(dir).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].1.ends_with("a_5.csv"));
    }

    #[test]
    fn test_find_frames_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_frames(&temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_process_frame_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_frame_csv(temp_dir.path(), "lidar_000007.csv");
        let out_dir = temp_dir.path().join("out");
        let detector = grid_detector();

        let result = process_frame_file(&input, &detector, Some(&out_dir), true).unwrap();

        assert_eq!(result.frame_id, 7);
        assert_eq!(result.points, 52);
        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections.detections[0].class, ObjectClass::Pedestrian);
        assert_eq!(result.detections_path, out_dir.join("lidar_000007_detections.csv"));

        let csv = fs::read_to_string(&result.detections_path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().starts_with("1,pedestrian,"));

        // Ground returns are not part of the labeled points
        let labels = fs::read_to_string(result.labels_path.unwrap()).unwrap();
        assert_eq!(labels.lines().count(), 51);
    }

    #[test]
    fn test_process_frame_without_labels_writes_next_to_input() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_frame_csv(temp_dir.path(), "scan_2.csv");
        let detector = grid_detector();

        let result = process_frame_file(&input, &detector, None, false).unwrap();
        assert!(result.labels_path.is_none());
        assert!(temp_dir.path().join("scan_2_detections.csv").exists());
    }

    #[test]
    fn test_process_unsupported_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("frame_1.bin");
        File::create(&path).unwrap();
        let detector = grid_detector();
        assert!(process_frame_file(&path, &detector, None, false).is_err());
    }
}
