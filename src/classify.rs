use crate::detect::Detection;
use crate::taxonomy::{FrameTally, Taxonomy};

/// Default minimum confidence for a detection to be counted.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Filters raw detections and tallies the survivors per category.
#[derive(Clone, Debug)]
pub struct Classifier {
    taxonomy: Taxonomy,
    threshold: f32,
}

impl Classifier {
    pub fn new(taxonomy: Taxonomy, threshold: f32) -> Self {
        Self {
            taxonomy,
            threshold,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Category index for an accepted detection, `None` if it is rejected.
    ///
    /// The threshold is inclusive. NaN confidences are rejected.
    pub fn category_of(&self, detection: &Detection) -> Option<usize> {
        if !(detection.confidence >= self.threshold) {
            return None;
        }
        self.taxonomy.index_of(&detection.label)
    }

    /// Tally one frame's detections. Never fails; an empty or fully rejected
    /// input yields a zeroed tally.
    pub fn classify(&self, detections: &[Detection]) -> FrameTally {
        let mut tally = self.taxonomy.empty_tally();
        for detection in detections {
            if let Some(index) = self.category_of(detection) {
                tally.record(index);
            }
        }
        tally
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Taxonomy::default(), DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary_is_inclusive() {
        let classifier = Classifier::default();
        let tally = classifier.classify(&[
            Detection::new("car", 0.39),
            Detection::new("car", 0.4),
            Detection::new("bus", 0.95),
        ]);
        assert_eq!(tally.total(), 2);
        assert_eq!(tally.count_of(classifier.taxonomy(), "car"), 1);
        assert_eq!(tally.count_of(classifier.taxonomy(), "bus"), 1);
    }

    #[test]
    fn unknown_labels_are_ignored() {
        let classifier = Classifier::default();
        let tally = classifier.classify(&[
            Detection::new("pedestrian", 0.99),
            Detection::new("bicycle", 0.8),
        ]);
        assert!(tally.is_zero());
        assert!(tally.counts().iter().all(|c| *c == 0));
    }

    #[test]
    fn labels_are_lower_cased_before_lookup() {
        let classifier = Classifier::default();
        let tally = classifier.classify(&[
            Detection::new("Jeepney", 0.7),
            Detection::new("PICKUP-TRUCK", 0.7),
        ]);
        assert_eq!(tally.count_of(classifier.taxonomy(), "jeepney"), 1);
        assert_eq!(tally.count_of(classifier.taxonomy(), "pickup-truck"), 1);
        assert_eq!(tally.total(), 2);
    }

    #[test]
    fn empty_and_nan_inputs_yield_zero_tally() {
        let classifier = Classifier::default();
        assert!(classifier.classify(&[]).is_zero());
        assert!(classifier
            .classify(&[Detection::new("car", f32::NAN)])
            .is_zero());
        assert_eq!(classifier.classify(&[]).counts().len(), 7);
    }

    #[test]
    fn injected_configuration_is_honoured() {
        let taxonomy = Taxonomy::from_labels(&["tricycle"]).unwrap();
        let classifier = Classifier::new(taxonomy, 0.8);
        let tally = classifier.classify(&[
            Detection::new("tricycle", 0.79),
            Detection::new("tricycle", 0.81),
            Detection::new("car", 0.99),
        ]);
        assert_eq!(tally.total(), 1);
        assert_eq!(tally.counts(), &[1]);
    }
}
