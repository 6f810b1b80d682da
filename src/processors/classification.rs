//! Heuristic classification and scoring of extracted boxes.
//!
//! None of these policies is a learned classifier and the scores they emit
//! are not probabilities. The policy is chosen once when the detector is
//! built; any `Fn(&BoundingBox, usize) -> (ObjectClass, f32)` closure can be
//! plugged in as well.

use crate::config::{ClassificationPolicy, ClassifierConfig};
use crate::core::detection::{BoundingBox, ObjectClass};

/// Assigns a class and a confidence to one box.
pub trait Classifier: Send + Sync {
    /// `point_count` is the size of the cluster the box was fitted to.
    fn classify(&self, bbox: &BoundingBox, point_count: usize) -> (ObjectClass, f32);
}

impl<F> Classifier for F
where
    F: Fn(&BoundingBox, usize) -> (ObjectClass, f32) + Send + Sync,
{
    fn classify(&self, bbox: &BoundingBox, point_count: usize) -> (ObjectClass, f32) {
        self(bbox, point_count)
    }
}

/// Vehicle when the footprint and volume are large enough, pedestrian
/// otherwise, with a constant score. Never emits [`ObjectClass::Cyclist`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeHeuristic {
    pub min_footprint: f32,
    pub min_volume: f32,
    pub score: f32,
}

impl Default for SizeHeuristic {
    fn default() -> Self {
        Self {
            min_footprint: 1.5,
            min_volume: 1.0,
            score: 0.9,
        }
    }
}

impl Classifier for SizeHeuristic {
    fn classify(&self, bbox: &BoundingBox, _point_count: usize) -> (ObjectClass, f32) {
        let large_footprint = bbox.length() > self.min_footprint || bbox.width() > self.min_footprint;
        let class = if large_footprint && bbox.volume() > self.min_volume {
            ObjectClass::Vehicle
        } else {
            ObjectClass::Pedestrian
        };
        (class, self.score)
    }
}

/// Every box is a vehicle; the score is the raw cluster point count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformVehicle;

impl Classifier for UniformVehicle {
    fn classify(&self, _bbox: &BoundingBox, point_count: usize) -> (ObjectClass, f32) {
        (ObjectClass::Vehicle, point_count as f32)
    }
}

/// Build the classifier described by the configuration.
pub fn build_classifier(config: &ClassifierConfig) -> Box<dyn Classifier> {
    match config.policy {
        ClassificationPolicy::SizeHeuristic => Box::new(SizeHeuristic {
            min_footprint: config.vehicle_min_footprint,
            min_volume: config.vehicle_min_volume,
            score: config.constant_score,
        }),
        ClassificationPolicy::UniformVehicle => Box::new(UniformVehicle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_heuristic_car() {
        let car = BoundingBox::new([10.0, 0.0, -1.0], [2.2, 0.9, 0.75]);
        assert_eq!(SizeHeuristic::default().classify(&car, 400), (ObjectClass::Vehicle, 0.9));
    }

    #[test]
    fn test_size_heuristic_pedestrian() {
        let person = BoundingBox::new([4.0, 1.0, -1.0], [0.3, 0.3, 0.85]);
        assert_eq!(
            SizeHeuristic::default().classify(&person, 60),
            (ObjectClass::Pedestrian, 0.9)
        );
    }

    #[test]
    fn test_size_heuristic_needs_volume() {
        // Long but flat: a curb or a wall strip
        let strip = BoundingBox::new([0.0, 0.0, -1.5], [3.0, 0.1, 0.1]);
        assert_eq!(SizeHeuristic::default().classify(&strip, 80).0, ObjectClass::Pedestrian);

        // Wide footprint alone qualifies when the volume is there
        let wide = BoundingBox::new([0.0, 0.0, 0.0], [0.5, 1.0, 1.0]);
        assert_eq!(SizeHeuristic::default().classify(&wide, 80).0, ObjectClass::Vehicle);
    }

    #[test]
    fn test_uniform_vehicle_scores_by_count() {
        let b = BoundingBox::new([0.0; 3], [0.1; 3]);
        assert_eq!(UniformVehicle.classify(&b, 57), (ObjectClass::Vehicle, 57.0));
    }

    #[test]
    fn test_closure_classifier() {
        let fake = |_: &BoundingBox, _: usize| (ObjectClass::Cyclist, 0.5);
        let b = BoundingBox::new([0.0; 3], [1.0; 3]);
        assert_eq!(fake.classify(&b, 3), (ObjectClass::Cyclist, 0.5));
    }

    #[test]
    fn test_build_classifier_from_config() {
        let b = BoundingBox::new([0.0; 3], [0.1; 3]);

        let mut config = ClassifierConfig::default();
        config.constant_score = 0.42;
        assert_eq!(
            build_classifier(&config).classify(&b, 50),
            (ObjectClass::Pedestrian, 0.42)
        );

        config.policy = ClassificationPolicy::UniformVehicle;
        assert_eq!(build_classifier(&config).classify(&b, 50), (ObjectClass::Vehicle, 50.0));
    }
}
