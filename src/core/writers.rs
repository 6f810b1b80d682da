//! CSV writers for detection results and cluster labels.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::detection::DetectionSet;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched array lengths.
    #[error("array length mismatch: coords has {coords_len} elements, labels has {labels_len} elements")]
    LengthMismatch { coords_len: usize, labels_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a buffered CSV writer, creating parent directories as needed.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Header of the detections CSV: class data, canonical box, then the corners.
fn detection_header() -> Vec<String> {
    let mut header: Vec<String> = [
        "class", "class_name", "score", "points", "cx", "cy", "cz", "hx", "hy", "hz",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for corner in 0..8 {
        for axis in ["x", "y", "z"] {
            header.push(format!("c{}_{}", corner, axis));
        }
    }
    header
}

/// Write detections to CSV, one row per detection.
///
/// Columns: `class, class_name, score, points, cx, cy, cz, hx, hy, hz`
/// followed by the 24 corner coordinates `c0_x .. c7_z` in box corner order.
/// An empty set produces a header-only file.
///
/// # Errors
///
/// Returns an error if the file or its parent directories cannot be created
/// or written.
///
/// # Example
///
/// ```no_run
/// use lidar_detector::core::detection::DetectionSet;
/// use lidar_detector::core::writers::write_detections_csv;
/// use std::path::Path;
///
/// write_detections_csv(Path::new("detections.csv"), &DetectionSet::new()).unwrap();
/// ```
pub fn write_detections_csv(path: &Path, detections: &DetectionSet) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();
    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    csv_writer.write_record(detection_header()).map_err(csv_err)?;

    for det in detections {
        let mut record = Vec::with_capacity(34);
        record.push(det.class.code().to_string());
        record.push(det.class.name().to_string());
        record.push(format!("{:.6}", det.score));
        record.push(det.point_count.to_string());
        for v in det.bbox.center.iter().chain(det.bbox.half_extents.iter()) {
            record.push(format!("{:.6}", v));
        }
        for corner in det.bbox.corners() {
            for v in corner {
                record.push(format!("{:.6}", v));
            }
        }
        csv_writer.write_record(&record).map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(())
}

/// Write labeled coordinates to CSV.
///
/// Creates a CSV file with headers "x,y,z,label" containing coordinate data
/// with associated cluster labels (-1 for noise).
///
/// # Errors
///
/// Returns an error if:
/// - `coords` and `labels` have different lengths
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_labels_csv(path: &Path, coords: &[[f32; 3]], labels: &[i32]) -> Result<()> {
    if coords.len() != labels.len() {
        return Err(WriteError::LengthMismatch {
            coords_len: coords.len(),
            labels_len: labels.len(),
        });
    }

    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    csv_writer
        .write_record(["x", "y", "z", "label"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (coord, label) in coords.iter().zip(labels.iter()) {
        csv_writer
            .write_record(&[
                format!("{:.6}", coord[0]),
                format!("{:.6}", coord[1]),
                format!("{:.6}", coord[2]),
                label.to_string(),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
