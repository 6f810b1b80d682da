//! Point cloud container and loaders for LIDAR frame files.
//!
//! This module provides:
//! - [`PointCloud`], the struct-of-arrays container used by every pipeline stage
//! - Conversion from the flat `(N, 4)` buffer a simulator hands over
//! - Parsers for Cartesian CSV frames (`x,y,z[,intensity]`)
//! - Parsers for ASCII PLY frames (with optional `intensity` property)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

/// Number of values per point in a flat LIDAR buffer: x, y, z, intensity.
pub const POINT_WIDTH: usize = 4;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported point cloud format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Supported on-disk frame formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudFormat {
    Csv,
    Ply,
}

impl CloudFormat {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(CloudFormat::Csv)
        } else if ext.eq_ignore_ascii_case("ply") {
            Some(CloudFormat::Ply)
        } else {
            None
        }
    }
}

/// A LIDAR sweep in the sensor's local frame.
///
/// Coordinates are meters with x forward, y lateral and z up, origin at the
/// sensor mount. Intensity is carried through the pipeline but never used by it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
    /// Return intensity of all points.
    pub intensity: Vec<f32>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
        }
    }

    /// Builds a cloud from a row-major `(N, 4)` buffer of `x, y, z, intensity`.
    ///
    /// Returns `None` when the buffer length is not a multiple of
    /// [`POINT_WIDTH`].
    pub fn from_flat(values: &[f32]) -> Option<Self> {
        if values.len() % POINT_WIDTH != 0 {
            return None;
        }
        let mut cloud = Self::with_capacity(values.len() / POINT_WIDTH);
        for row in values.chunks_exact(POINT_WIDTH) {
            cloud.push(row[0], row[1], row[2], row[3]);
        }
        Some(cloud)
    }

    /// Builds a cloud from `[x, y, z, intensity]` tuples.
    pub fn from_points(points: &[[f32; 4]]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push(p[0], p[1], p[2], p[3]);
        }
        cloud
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Converts point cloud to a vector of [x, y, z] coordinate arrays.
    pub fn to_coords(&self) -> Vec<[f32; 3]> {
        (0..self.len())
            .map(|i| [self.x[i], self.y[i], self.z[i]])
            .collect()
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32, intensity: f32) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.intensity.push(intensity);
    }

    /// Returns the point at `idx` as `[x, y, z, intensity]`.
    #[inline]
    pub fn point(&self, idx: usize) -> [f32; 4] {
        [self.x[idx], self.y[idx], self.z[idx], self.intensity[idx]]
    }

    /// Returns a new cloud holding the points at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> PointCloud {
        let mut out = PointCloud::with_capacity(indices.len());
        for &i in indices {
            out.push(self.x[i], self.y[i], self.z[i], self.intensity[i]);
        }
        out
    }
}

/// Load a frame from disk, choosing the parser by file extension.
pub fn load_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    match CloudFormat::from_path(path) {
        Some(CloudFormat::Csv) => load_cloud_csv(path),
        Some(CloudFormat::Ply) => load_ply(path),
        None => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load a point cloud from a CSV file with x, y, z and optional intensity columns.
///
/// Column names are matched case-insensitively. When no header names match,
/// the first three columns are used as coordinates and the fourth, if present,
/// as intensity. Missing intensity defaults to 0.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a value fails to parse, or
/// the file holds no points.
pub fn load_cloud_csv<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let x_idx = col_map.get("x").copied().unwrap_or(0);
    let y_idx = col_map.get("y").copied().unwrap_or(1);
    let z_idx = col_map.get("z").copied().unwrap_or(2);
    let i_idx = col_map
        .get("intensity")
        .or_else(|| col_map.get("i"))
        .copied()
        .or(if headers.len() > 3 { Some(3) } else { None });

    let mut cloud = PointCloud::with_capacity(16_384);

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = |idx: usize, name: &str| -> Result<f32> {
            let raw = record.get(idx).ok_or_else(|| {
                LoaderError::MissingColumns(format!("{} (row {})", name, row + 1))
            })?;
            raw.parse().map_err(|_| {
                LoaderError::ParseError(format!("Invalid {} value on row {}: {}", name, row + 1, raw))
            })
        };

        let x = field(x_idx, "x")?;
        let y = field(y_idx, "y")?;
        let z = field(z_idx, "z")?;
        let intensity = match i_idx {
            Some(idx) if record.get(idx).is_some() => field(idx, "intensity")?,
            _ => 0.0,
        };

        cloud.push(x, y, z, intensity);
    }

    if cloud.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(cloud)
}

/// Load a point cloud from an ASCII PLY file.
///
/// Supports PLY files with vertex elements containing:
/// - Required: x, y, z properties
/// - Optional: intensity property (defaults to 0)
///
/// # Errors
///
/// Returns an error if the file is not a valid PLY or lacks required properties.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::InvalidPly("Empty file".to_string()))??;

    if !first_line.trim().starts_with("ply") {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut header_done = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("format") && !stripped.contains("ascii") {
            return Err(LoaderError::InvalidPly(
                "Only ASCII PLY files are supported".to_string(),
            ));
        } else if stripped.starts_with("element vertex") {
            num_vertices = stripped
                .split_whitespace()
                .last()
                .and_then(|count| count.parse().ok());
        } else if stripped.starts_with("property") {
            if let Some(name) = stripped.split_whitespace().last() {
                prop_names.push(name.to_string());
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }

    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let index_of = |name: &str| -> Result<usize> {
        prop_idx
            .get(name)
            .copied()
            .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))
    };
    let x_idx = index_of("x")?;
    let y_idx = index_of("y")?;
    let z_idx = index_of("z")?;
    let i_idx = prop_idx.get("intensity").copied();

    let mut cloud = PointCloud::with_capacity(num_vertices);

    for line in lines {
        if cloud.len() >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();

        if values.len() < prop_names.len() {
            continue;
        }

        let parse = |idx: usize, name: &str| -> Result<f32> {
            values[idx].parse().map_err(|_| {
                LoaderError::ParseError(format!("Invalid {} value: {}", name, values[idx]))
            })
        };

        let x = parse(x_idx, "x")?;
        let y = parse(y_idx, "y")?;
        let z = parse(z_idx, "z")?;
        let intensity = match i_idx {
            Some(idx) => parse(idx, "intensity")?,
            None => 0.0,
        };

        cloud.push(x, y, z, intensity);
    }

    if cloud.len() < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices,
            cloud.len()
        )));
    }

    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn test_point_cloud_operations() {
        let mut cloud = PointCloud::new();
        assert!(cloud.is_empty());

        cloud.push(1.0, 2.0, 3.0, 0.5);
        cloud.push(4.0, 5.0, 6.0, 0.7);

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.point(1), [4.0, 5.0, 6.0, 0.7]);

        let coords = cloud.to_coords();
        assert_eq!(coords, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        let picked = cloud.select(&[1]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked.intensity, vec![0.7]);
    }

    #[test]
    fn test_from_flat() {
        let cloud = PointCloud::from_flat(&[1.0, 2.0, 3.0, 0.1, 4.0, 5.0, 6.0, 0.2]).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.z, vec![3.0, 6.0]);
        assert_eq!(cloud.intensity, vec![0.1, 0.2]);

        assert!(PointCloud::from_flat(&[]).unwrap().is_empty());
        assert!(PointCloud::from_flat(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_load_cloud_csv_with_intensity() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z,intensity").unwrap();
        writeln!(file, "1.0,2.0,3.0,0.5").unwrap();
        writeln!(file, "4.0, 5.0, 6.0, 0.25").unwrap();
        file.flush().unwrap();

        let cloud = load_cloud_csv(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.point(0), [1.0, 2.0, 3.0, 0.5]);
        assert_eq!(cloud.point(1), [4.0, 5.0, 6.0, 0.25]);

        Ok(())
    }

    #[test]
    fn test_load_cloud_csv_without_intensity() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "X,Y,Z").unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        file.flush().unwrap();

        let cloud = load_cloud_csv(file.path())?;
        assert_eq!(cloud.point(0), [1.0, 2.0, 3.0, 0.0]);

        Ok(())
    }

    #[test]
    fn test_load_cloud_csv_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z").unwrap();
        writeln!(file, "1.0,abc,3.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_cloud_csv(file.path()),
            Err(LoaderError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_cloud_csv_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_cloud_csv(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_load_ply() -> Result<()> {
        let mut file = Builder::new().suffix(".ply").tempfile().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 2").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "property float intensity").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "1.0 2.0 3.0 0.5").unwrap();
        writeln!(file, "4.0 5.0 6.0 0.9").unwrap();
        file.flush().unwrap();

        let cloud = load_cloud(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.y[1], 5.0);
        assert_eq!(cloud.intensity, vec![0.5, 0.9]);

        Ok(())
    }

    #[test]
    fn test_load_ply_truncated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 3").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "1.0 2.0 3.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_ply(file.path()),
            Err(LoaderError::InvalidPly(_))
        ));
    }

    #[test]
    fn test_cloud_format_from_path() {
        assert_eq!(CloudFormat::from_path(Path::new("a/frame_01.CSV")), Some(CloudFormat::Csv));
        assert_eq!(CloudFormat::from_path(Path::new("frame.ply")), Some(CloudFormat::Ply));
        assert_eq!(CloudFormat::from_path(Path::new("frame.bin")), None);
        assert!(matches!(
            load_cloud("frame.bin"),
            Err(LoaderError::UnsupportedFormat(_))
        ));
    }
}
