fn main() {
    lidar_detector::cli::run();
}
