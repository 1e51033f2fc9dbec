//! Family supervision targets and the deterministic train/validation split.

use std::collections::BTreeSet;

use rand::{SeedableRng, seq::SliceRandom};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use signalfleet_features::{example::TrainingExample, value::FeatureValue};

/// Closed class set of the boundary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryClass {
    ConfirmMappings,
    NeedsFollowup,
    Stable,
    Unknown,
}

impl BoundaryClass {
    /// All classes, in class-index order.
    pub const ALL: [Self; 4] = [
        Self::ConfirmMappings,
        Self::NeedsFollowup,
        Self::Stable,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmMappings => "confirm_mappings",
            Self::NeedsFollowup => "needs_followup",
            Self::Stable => "stable",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Maps a label to its class; absent and unlisted labels are [`Self::Unknown`].
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        Self::ALL
            .into_iter()
            .find(|class| Some(class.as_str()) == label)
            .unwrap_or(Self::Unknown)
    }

    /// Whether predicting `stable` for this true class would be a false-safe error.
    #[must_use]
    pub fn is_unsafe(self) -> bool {
        !matches!(self, Self::Stable | Self::Unknown)
    }

    #[must_use]
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|c| c.as_str().to_owned()).collect()
    }
}

#[must_use]
pub fn boundary_class(example: &TrainingExample) -> BoundaryClass {
    BoundaryClass::from_label(example.targets.boundary_class.as_deref())
}

/// Sorted union of the pressure tags of `examples`.
#[must_use]
pub fn pressure_tag_universe(examples: &[TrainingExample]) -> Vec<String> {
    examples
        .iter()
        .flat_map(|example| &example.targets.pressure_keys)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Indices into `tags` of the example's true pressure tags; unknown tags are dropped.
#[must_use]
pub fn active_tags(example: &TrainingExample, tags: &[String]) -> Vec<usize> {
    tags.iter()
        .enumerate()
        .filter(|(_, tag)| example.targets.pressure_keys.contains(*tag))
        .map(|(i, _)| i)
        .collect()
}

pub const DEFAULT_PERCENTILE: f64 = 50.0;

/// Calibrator training target: the mean benchmark percentile, or the neutral 50.
#[must_use]
pub fn calibrator_target(example: &TrainingExample) -> f64 {
    example
        .mean_benchmark_percentile()
        .unwrap_or(DEFAULT_PERCENTILE)
}

/// Whether the example's mapping confidence level is 0 (an absent level counts as 0).
#[must_use]
pub fn has_low_mapping_confidence(example: &TrainingExample) -> bool {
    match example.features.get("mapping_confidence_level") {
        None => true,
        Some(FeatureValue::Number(level)) => *level == 0.0,
        Some(_) => false,
    }
}

/// Row indices of a train/validation split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

impl DataSplit {
    /// Shuffles `0..n` with a seeded generator and takes the first
    /// `ceil(n · fraction)` indices as validation, keeping at least one
    /// training row. Both halves are returned in ascending order.
    ///
    /// ```
    /// # use signalfleet_evaluator::targets::DataSplit;
    /// let split = DataSplit::new(10, 0.2, 42);
    /// assert_eq!(split.validation.len(), 2);
    /// assert_eq!(split.train.len(), 8);
    /// assert_eq!(split, DataSplit::new(10, 0.2, 42));
    /// ```
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn new(n: usize, validation_fraction: f64, seed: u64) -> Self {
        let mut indices = (0..n).collect::<Vec<_>>();
        let mut rng = Pcg64::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let wanted = (n as f64 * validation_fraction.clamp(0.0, 1.0)).ceil() as usize;
        let validation_len = wanted.min(n.saturating_sub(1));
        let mut train = indices.split_off(validation_len);
        let mut validation = indices;
        train.sort_unstable();
        validation.sort_unstable();
        Self { train, validation }
    }
}

/// Clones the selected items, in index order.
#[must_use]
pub fn select<T>(items: &[T], indices: &[usize]) -> Vec<T>
where
    T: Clone,
{
    indices.iter().map(|&i| items[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(json: &str) -> TrainingExample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_boundary_labels() {
        assert_eq!(BoundaryClass::from_label(Some("stable")), BoundaryClass::Stable);
        assert_eq!(BoundaryClass::from_label(Some("escalate")), BoundaryClass::Unknown);
        assert_eq!(BoundaryClass::from_label(None), BoundaryClass::Unknown);
        for (i, class) in BoundaryClass::ALL.into_iter().enumerate() {
            assert_eq!(class.index(), i);
            assert_eq!(BoundaryClass::from_index(i), Some(class));
        }
        assert!(BoundaryClass::ConfirmMappings.is_unsafe());
        assert!(!BoundaryClass::Unknown.is_unsafe());
    }

    #[test]
    fn test_pressure_targets() {
        let examples = [
            example(r#"{"id": "a", "targets": {"pressure_keys": ["tag_c", "tag_a"]}}"#),
            example(r#"{"id": "b", "targets": {"pressure_keys": ["tag_b", "tag_a"]}}"#),
        ];
        let tags = pressure_tag_universe(&examples);
        assert_eq!(tags, ["tag_a", "tag_b", "tag_c"]);
        assert_eq!(active_tags(&examples[0], &tags), vec![0, 2]);
    }

    #[test]
    fn test_calibrator_target_default() {
        let with = example(
            r#"{"id": "a", "targets": {"benchmark": [{"percentile": 20}, {"percentile": 40}]}}"#,
        );
        let without = example(r#"{"id": "b"}"#);
        assert_eq!(calibrator_target(&with), 30.0);
        assert_eq!(calibrator_target(&without), 50.0);
    }

    #[test]
    fn test_low_mapping_confidence() {
        assert!(has_low_mapping_confidence(&example(r#"{"id": "a"}"#)));
        assert!(has_low_mapping_confidence(&example(
            r#"{"id": "a", "features": {"mapping_confidence_level": 0}}"#
        )));
        assert!(!has_low_mapping_confidence(&example(
            r#"{"id": "a", "features": {"mapping_confidence_level": 2}}"#
        )));
    }

    #[test]
    fn test_split_partitions_indices() {
        let split = DataSplit::new(23, 0.2, 7);
        assert_eq!(split.validation.len(), 5);
        let mut all = split.train.clone();
        all.extend(&split.validation);
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_keeps_a_training_row() {
        let split = DataSplit::new(1, 0.2, 42);
        assert_eq!(split.train, vec![0]);
        assert!(split.validation.is_empty());
    }
}
