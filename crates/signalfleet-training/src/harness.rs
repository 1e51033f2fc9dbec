//! Single-family and whole-fleet training entry points.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalfleet_features::{
    codec,
    dataset::dataset_fingerprint,
    example::TrainingExample,
    schema::FeatureSchema,
};
use signalfleet_store::{
    ModelBundle, ModelFamily, ModelStore, VersionId,
    metadata::{FamilyMetrics, TrainingRecord},
};

use crate::{TrainingConfig, TrainingError, boundary, calibrator, cohort, pressure};

/// Written at the models root by [`train_all`].
pub const SUMMARY_FILE: &str = "training_summary.json";

/// A version published by a trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedVersion {
    pub family: ModelFamily,
    pub version: VersionId,
    pub training_examples: usize,
    pub validation_examples: usize,
    pub metrics: FamilyMetrics,
}

impl TrainedVersion {
    pub(crate) fn publish(
        store: &ModelStore,
        bundle: &ModelBundle,
        record: TrainingRecord,
    ) -> Result<Self, TrainingError> {
        let version = store.write_version(bundle)?;
        Ok(Self {
            family: bundle.family(),
            version,
            training_examples: record.training_examples,
            validation_examples: record.validation_examples,
            metrics: record.metrics,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FamilyOutcome {
    Trained(TrainedVersion),
    Skipped { reason: String },
}

/// Contents of `training_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub trained_at: DateTime<Utc>,
    pub examples: usize,
    pub dataset_fingerprint: String,
    pub families: BTreeMap<ModelFamily, FamilyOutcome>,
}

impl TrainingSummary {
    pub fn trained(&self) -> impl Iterator<Item = &TrainedVersion> {
        self.families.values().filter_map(|outcome| match outcome {
            FamilyOutcome::Trained(trained) => Some(trained),
            FamilyOutcome::Skipped { .. } => None,
        })
    }
}

/// Trains one family and publishes the result as a new version.
pub fn train_family(
    store: &ModelStore,
    schema: &FeatureSchema,
    family: ModelFamily,
    examples: &[TrainingExample],
    config: &TrainingConfig,
) -> Result<TrainedVersion, TrainingError> {
    tracing::info!(%family, examples = examples.len(), "training");
    let trained = match family {
        ModelFamily::Cohort => cohort::train(store, schema, examples, config),
        ModelFamily::PressureSelector => pressure::train(store, schema, examples, config),
        ModelFamily::BoundaryClassifier => boundary::train(store, schema, examples, config),
        ModelFamily::Calibrator => calibrator::train(store, schema, examples, config),
    }?;
    tracing::info!(
        %family,
        version = %trained.version,
        training = trained.training_examples,
        validation = trained.validation_examples,
        "trained"
    );
    Ok(trained)
}

/// Trains every listed family in turn and writes [`SUMMARY_FILE`].
///
/// A family rejected for its data (too few examples, no targets) is
/// recorded as skipped; any other failure aborts the run.
pub fn train_all(
    store: &ModelStore,
    schema: &FeatureSchema,
    families: &[ModelFamily],
    examples: &[TrainingExample],
    config: &TrainingConfig,
) -> Result<TrainingSummary, TrainingError> {
    let mut outcomes = BTreeMap::new();
    for &family in families {
        let outcome = match train_family(store, schema, family, examples, config) {
            Ok(trained) => FamilyOutcome::Trained(trained),
            Err(e) if e.is_skippable() => {
                tracing::warn!(%family, error = %e, "skipping family");
                FamilyOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };
        outcomes.insert(family, outcome);
    }

    let summary = TrainingSummary {
        trained_at: Utc::now(),
        examples: examples.len(),
        dataset_fingerprint: dataset_fingerprint(examples),
        families: outcomes,
    };
    let path = store.write_root_file(SUMMARY_FILE, &summary)?;
    tracing::debug!(path = %path.display(), "wrote training summary");
    Ok(summary)
}

pub(crate) fn require_examples(
    family: ModelFamily,
    examples: &[TrainingExample],
    config: &TrainingConfig,
) -> Result<(), TrainingError> {
    if examples.len() < config.min_examples {
        return Err(TrainingError::InsufficientData {
            family,
            required: config.min_examples,
            found: examples.len(),
        });
    }
    Ok(())
}

/// Batch-encodes the examples against `keys`.
pub(crate) fn encode(
    schema: &FeatureSchema,
    keys: &[String],
    examples: &[TrainingExample],
) -> Vec<Vec<f64>> {
    codec::encode_batch_with_keys(
        keys,
        &schema.encoders_for(keys),
        examples.iter().map(|example| &example.features),
    )
}

pub(crate) fn record(
    schema: &FeatureSchema,
    keys: Vec<String>,
    examples: &[TrainingExample],
    training_examples: usize,
    validation_examples: usize,
    metrics: FamilyMetrics,
) -> TrainingRecord {
    TrainingRecord {
        schema_version: schema.version().to_owned(),
        schema_hash: schema.hash().to_owned(),
        categorical_encoders: schema.encoders_for(&keys),
        feature_keys: keys,
        dataset_fingerprint: dataset_fingerprint(examples),
        training_examples,
        validation_examples,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::tests_support::{example_set, schema};

    #[test]
    fn test_train_all_skips_families_without_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        // no benchmark percentiles and no boundary labels anywhere
        let examples = example_set(20, false, false);
        let config = TrainingConfig {
            clusters: 2,
            ..TrainingConfig::default()
        };

        let summary = train_all(&store, &schema(), &ModelFamily::ALL, &examples, &config).unwrap();
        assert_eq!(summary.examples, 20);
        assert!(matches!(
            summary.families[&ModelFamily::Cohort],
            FamilyOutcome::Trained(_)
        ));
        assert!(matches!(
            summary.families[&ModelFamily::PressureSelector],
            FamilyOutcome::Trained(_)
        ));
        assert!(matches!(
            summary.families[&ModelFamily::BoundaryClassifier],
            FamilyOutcome::Skipped { .. }
        ));
        assert!(matches!(
            summary.families[&ModelFamily::Calibrator],
            FamilyOutcome::Skipped { .. }
        ));
        assert_eq!(summary.trained().count(), 2);

        let written: TrainingSummary =
            serde_json::from_slice(&fs::read(dir.path().join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(written, summary);
        // training never promotes
        assert_eq!(store.promoted_version(ModelFamily::Cohort).unwrap(), None);
    }

    #[test]
    fn test_too_few_examples_skips_every_family() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = example_set(5, true, true);

        let summary = train_all(
            &store,
            &schema(),
            &ModelFamily::ALL,
            &examples,
            &TrainingConfig::default(),
        )
        .unwrap();
        assert_eq!(summary.trained().count(), 0);
        for family in ModelFamily::ALL {
            assert_eq!(store.latest_version(family).unwrap(), None);
        }
    }

    #[test]
    fn test_train_all_skips_cohort_with_fewer_examples_than_clusters() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = example_set(5, true, true);
        let config = TrainingConfig {
            min_examples: 5,
            validation_fraction: 0.4,
            ..TrainingConfig::default()
        };
        assert!(examples.len() < config.clusters);

        let summary = train_all(&store, &schema(), &ModelFamily::ALL, &examples, &config).unwrap();
        let FamilyOutcome::Skipped { reason } = &summary.families[&ModelFamily::Cohort] else {
            panic!("cohort unexpectedly trained");
        };
        assert!(reason.contains("at least 8"), "{reason}");
        assert_eq!(summary.trained().count(), 3);
        assert_eq!(store.latest_version(ModelFamily::Cohort).unwrap(), None);
        assert!(dir.path().join(SUMMARY_FILE).is_file());
    }
}
