//! Command-line interface for the LIDAR detector.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ClassificationPolicy, ClusteringBackend, FilterConfig};
use crate::core::detection::DetectionSet;
use crate::processors::frames::{self, FrameOutput};
use crate::sensors::{default_sensor_suite, find_sensor, suite_to_yaml};
use crate::{Detector, DetectorConfig};

#[derive(Parser)]
#[command(name = "lidar-detector")]
#[command(about = "Geometric LIDAR object detection", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Kdtree,
    Grid,
}

impl From<BackendArg> for ClusteringBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Kdtree => ClusteringBackend::KdTree,
            BackendArg::Grid => ClusteringBackend::Grid,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Size,
    Uniform,
}

impl From<PolicyArg> for ClassificationPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Size => ClassificationPolicy::SizeHeuristic,
            PolicyArg::Uniform => ClassificationPolicy::UniformVehicle,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect objects in a frame file or a directory of frames
    Detect {
        /// Input CSV/PLY frame or directory of frames
        input: PathBuf,
        /// Output directory for detection CSVs (defaults to next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Neighborhood radius for clustering, in meters
        #[arg(long)]
        eps: Option<f32>,
        /// Minimum neighborhood size of a core point
        #[arg(long)]
        min_samples: Option<usize>,
        /// Ground threshold in the sensor frame (exclusive)
        #[arg(long, allow_hyphen_values = true)]
        height_threshold: Option<f32>,
        /// Derive the ground threshold from the LIDAR mount and this clearance above the road
        #[arg(long, conflicts_with = "height_threshold")]
        clearance: Option<f32>,
        /// Clustering backend
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
        /// Classification policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Also write per-point cluster labels
        #[arg(long)]
        labels: bool,
        /// Limit number of frames to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print or save the sensor rig the detector expects
    Sensors {
        /// Output YAML file (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a frame and its detections from above (PNG)
    Visualize {
        /// Input CSV/PLY frame
        input: PathBuf,
        /// Output PNG file path (defaults to same name as input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum number of points to plot (subsamples if exceeded)
        #[arg(long, default_value_t = 1_000_000)]
        max_points: usize,
        /// Color points by cluster instead of drawing detection boxes
        #[arg(long)]
        clusters: bool,
    },

    /// Write the default configuration to a YAML file
    InitConfig {
        /// Destination path
        #[arg(default_value = "lidar-detector.yaml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar for frame batches
fn create_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn build_detector(config: DetectorConfig) -> Detector {
    match Detector::new(config) {
        Ok(detector) => detector,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn format_counts(detections: &DetectionSet) -> String {
    let [vehicles, pedestrians, cyclists] = detections.class_counts();
    format!("{} / {} / {}", vehicles, pedestrians, cyclists)
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match DetectorConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                DetectorConfig::default()
            }
        },
        None => DetectorConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Detect {
            input,
            output_dir,
            eps,
            min_samples,
            height_threshold,
            clearance,
            backend,
            policy,
            labels,
            limit,
        } => {
            let mut config = config;
            if let Some(eps) = eps {
                config.clustering.eps = eps;
            }
            if let Some(min_samples) = min_samples {
                config.clustering.min_samples = min_samples;
            }
            if let Some(threshold) = height_threshold {
                config.filter.height_threshold = threshold;
            }
            if let Some(clearance) = clearance {
                config.filter = filter_from_clearance(&config, clearance);
            }
            if let Some(backend) = backend {
                config.clustering.backend = backend.into();
            }
            if let Some(policy) = policy {
                config.classifier.policy = policy.into();
            }
            cmd_detect(&input, output_dir.as_deref(), labels, limit, config);
        }
        Commands::Sensors { output } => {
            cmd_sensors(output.as_deref());
        }
        Commands::Visualize { input, output, max_points, clusters } => {
            cmd_visualize(&input, output, max_points, clusters, config);
        }
        Commands::InitConfig { path, force } => {
            cmd_init_config(&path, force, &config);
        }
    }
}

fn filter_from_clearance(config: &DetectorConfig, clearance: f32) -> FilterConfig {
    let suite = default_sensor_suite();
    match find_sensor(&suite, &config.lidar_sensor_id) {
        Some(lidar) => FilterConfig::from_mount(lidar.pose.z, clearance),
        None => {
            warn!(
                "'{}' is not in the sensor rig; keeping height threshold {}",
                config.lidar_sensor_id, config.filter.height_threshold
            );
            config.filter.clone()
        }
    }
}

fn cmd_detect(
    input: &Path,
    output_dir: Option<&Path>,
    write_labels: bool,
    limit: Option<usize>,
    config: DetectorConfig,
) {
    let start = Instant::now();

    println!("Running LIDAR detection...");
    println!("Input: {}", input.display());
    println!("Parameters:");
    println!("  height_threshold: {}", config.filter.height_threshold);
    println!("  eps: {}", config.clustering.eps);
    println!("  min_samples: {}", config.clustering.min_samples);
    println!("  backend: {:?}", config.clustering.backend);
    println!("  policy: {:?}", config.classifier.policy);

    let detector = build_detector(config);
    if !detector.is_enabled() {
        warn!("Detector is disabled; every frame will report no detections");
    }

    if input.is_dir() {
        cmd_detect_batch(input, output_dir, write_labels, limit, &detector, start);
        return;
    }

    let spinner = create_spinner("Detecting objects...");

    match frames::process_frame_file(input, &detector, output_dir, write_labels) {
        Ok(result) => {
            spinner.finish_and_clear();

            let mut items = vec![
                ("Input file", input.display().to_string()),
                ("Output CSV", result.detections_path.display().to_string()),
                ("Points", result.points.to_string()),
                ("Detections", result.detections.len().to_string()),
                ("Veh / Ped / Cyc", format_counts(&result.detections)),
            ];
            if let Some(labels_path) = &result.labels_path {
                items.push(("Labels CSV", labels_path.display().to_string()));
            }
            items.push(("Duration", format!("{:.2?}", start.elapsed())));

            print_summary("Detection Complete", &items);
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Detection failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_detect_batch(
    input_dir: &Path,
    output_dir: Option<&Path>,
    write_labels: bool,
    limit: Option<usize>,
    detector: &Detector,
    start: Instant,
) {
    let mut frame_files = match frames::find_frames(input_dir) {
        Ok(found) => found,
        Err(e) => {
            error!("Failed to list frames: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(lim) = limit {
        println!("Processing limit: {} frames", lim);
        frame_files.truncate(lim);
    }
    if frame_files.is_empty() {
        warn!("No frame files found in {}", input_dir.display());
        return;
    }

    let pb = create_progress_bar(frame_files.len());

    let results: Vec<(u64, anyhow::Result<FrameOutput>)> = frame_files
        .par_iter()
        .map(|(frame_id, path)| {
            let result = frames::process_frame_file(path, detector, output_dir, write_labels);
            pb.inc(1);
            (*frame_id, result)
        })
        .collect();

    pb.finish_and_clear();

    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut total = DetectionSet::new();
    for (frame_id, result) in results {
        match result {
            Ok(output) => {
                processed += 1;
                for det in &output.detections {
                    total.push(det.clone());
                }
            }
            Err(e) => {
                failed += 1;
                error!("Frame {} failed: {:#}", frame_id, e);
            }
        }
    }

    print_summary(
        "Batch Detection Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Frames processed", processed.to_string()),
            ("Frames failed", failed.to_string()),
            ("Detections", total.len().to_string()),
            ("Veh / Ped / Cyc", format_counts(&total)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn cmd_sensors(output: Option<&Path>) {
    let suite = default_sensor_suite();
    let yaml = match suite_to_yaml(&suite) {
        Ok(yaml) => yaml,
        Err(e) => {
            error!("Failed to serialize sensor rig: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, yaml) {
                error!("Failed to write {}: {}", path.display(), e);
                std::process::exit(1);
            }
            print_summary(
                "Sensor Rig Written",
                &[
                    ("Output file", path.display().to_string()),
                    ("Sensors", suite.len().to_string()),
                ],
            );
        }
        None => print!("{}", yaml),
    }
}

fn cmd_visualize(
    input: &Path,
    output: Option<PathBuf>,
    max_points: usize,
    clusters: bool,
    config: DetectorConfig,
) {
    use crate::core::loaders;
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| input.with_extension("png"));

    println!("Visualizing frame...");
    println!("Input: {}", input.display());
    println!("Output: {}", output_path.display());
    println!("Max points: {}", max_points);

    let spinner = create_spinner("Loading frame...");

    let cloud = match loaders::load_cloud(input) {
        Ok(c) => c,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load frame: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Running detector...");
    let threshold = config.filter.height_threshold;
    let detector = build_detector(config);
    let detections = detector.detect_cloud(&cloud);

    spinner.set_message("Generating plot...");

    let result = if clusters {
        match detector.cluster_labels(&cloud) {
            Some((coords, labels)) => {
                visualization::plot_labeled_cloud(&output_path, &coords, &labels, max_points)
            }
            None => Err(visualization::VisualizationError::EmptyPointCloud),
        }
    } else {
        visualization::plot_detections(&output_path, &cloud, &detections, Some(threshold), max_points)
    };

    match result {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Visualization Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Points in frame", cloud.len().to_string()),
                    ("Detections", detections.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Visualization failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(path: &Path, force: bool, config: &DetectorConfig) {
    if path.exists() && !force {
        error!("{} already exists (use --force to overwrite)", path.display());
        std::process::exit(1);
    }

    match config.to_yaml(path) {
        Ok(()) => {
            print_summary(
                "Config Written",
                &[
                    ("Output file", path.display().to_string()),
                    ("LIDAR sensor", config.lidar_sensor_id.clone()),
                    ("Height threshold", config.filter.height_threshold.to_string()),
                    ("eps", config.clustering.eps.to_string()),
                    ("min_samples", config.clustering.min_samples.to_string()),
                ],
            );
        }
        Err(e) => {
            error!("Failed to write config: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_detect_overrides() {
        let cli = Cli::try_parse_from([
            "lidar-detector",
            "-vv",
            "detect",
            "frames/",
            "--eps",
            "0.5",
            "--height-threshold",
            "-1.2",
            "--backend",
            "grid",
            "--policy",
            "uniform",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Detect {
                eps,
                height_threshold,
                backend,
                policy,
                labels,
                ..
            } => {
                assert_eq!(eps, Some(0.5));
                assert_eq!(height_threshold, Some(-1.2));
                assert_eq!(ClusteringBackend::from(backend.unwrap()), ClusteringBackend::Grid);
                assert_eq!(
                    ClassificationPolicy::from(policy.unwrap()),
                    ClassificationPolicy::UniformVehicle
                );
                assert!(!labels);
            }
            _ => panic!("expected detect"),
        }
    }

    #[test]
    fn test_threshold_and_clearance_conflict() {
        let result = Cli::try_parse_from([
            "lidar-detector",
            "detect",
            "frame.csv",
            "--height-threshold",
            "-1.5",
            "--clearance",
            "0.3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_from_clearance_uses_lidar_mount() {
        let config = DetectorConfig::default();
        let filter = filter_from_clearance(&config, 0.3);
        assert!((filter.height_threshold - (-1.7)).abs() < 1e-6);

        let mut unknown = DetectorConfig::default();
        unknown.lidar_sensor_id = "LIDAR_Rear".to_string();
        assert_eq!(filter_from_clearance(&unknown, 0.3).height_threshold, -1.5);
    }
}
