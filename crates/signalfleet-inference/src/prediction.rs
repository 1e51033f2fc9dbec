use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use signalfleet_store::{ModelFamily, VersionId, family::MetricRange};

/// Nearest cohort of an input and how far it sits from the cohort centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortAssignment {
    pub cohort_id: usize,
    pub cohort_label: String,
    pub confidence: f64,
    pub distance_to_centroid: f64,
    pub expected_ranges: Vec<MetricRange>,
}

impl CohortAssignment {
    /// Confidence is `1 / (1 + distance)`, clamped to `[0, 1]`.
    ///
    /// ```
    /// # use signalfleet_inference::prediction::CohortAssignment;
    /// let assignment = CohortAssignment::new(2, 1.0, vec![]);
    /// assert_eq!(assignment.cohort_label, "cohort_2");
    /// assert_eq!(assignment.confidence, 0.5);
    /// ```
    #[must_use]
    pub fn new(cohort_id: usize, distance_to_centroid: f64, expected_ranges: Vec<MetricRange>) -> Self {
        Self {
            cohort_id,
            cohort_label: format!("cohort_{cohort_id}"),
            confidence: (1.0 / (1.0 + distance_to_centroid)).clamp(0.0, 1.0),
            distance_to_centroid,
            expected_ranges,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPrediction {
    pub boundary_class: String,
    /// Probability of the predicted class.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedPercentiles {
    pub avg: f64,
}

/// A requested family with no usable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableFamily {
    pub family: ModelFamily,
    pub reason: String,
}

/// Predictions of every available family for one input.
///
/// Families that were not requested or had no model leave their fields
/// empty; the boundary prediction is flattened into the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<CohortAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_keys: Option<Vec<String>>,
    #[serde(flatten)]
    pub boundary: Option<BoundaryPrediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated_percentiles: Option<CalibratedPercentiles>,
    pub model_versions: BTreeMap<ModelFamily, VersionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<UnavailableFamily>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(CohortAssignment::new(0, 0.0, vec![]).confidence, 1.0);
        assert_eq!(CohortAssignment::new(0, 3.0, vec![]).confidence, 0.25);
        // a negative distance cannot come out of k-means but must not exceed 1
        assert_eq!(CohortAssignment::new(0, -0.5, vec![]).confidence, 1.0);
    }

    #[test]
    fn test_json_shape() {
        let result = InferenceResult {
            pressure_keys: Some(vec!["capacity".to_owned()]),
            boundary: Some(BoundaryPrediction {
                boundary_class: "stable".to_owned(),
                confidence: 0.75,
            }),
            model_versions: BTreeMap::from([(
                ModelFamily::BoundaryClassifier,
                VersionId::new("20260117-093012-000451"),
            )]),
            ..InferenceResult::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "pressure_keys": ["capacity"],
                "boundary_class": "stable",
                "confidence": 0.75,
                "model_versions": {"boundary_classifier": "20260117-093012-000451"},
            })
        );
        let back: InferenceResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
