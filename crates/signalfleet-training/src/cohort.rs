//! Cohort family: k-means over standardized numeric signals.
//!
//! Categorical keys are left out of the clustering. After fitting, every
//! cohort gets expected ranges for the configured benchmark metrics,
//! computed from its members' raw feature values.

use std::collections::BTreeMap;

use signalfleet_estimators::{kmeans::KMeans, scaler::StandardScaler};
use signalfleet_evaluator::cohort;
use signalfleet_features::{example::TrainingExample, schema::FeatureSchema, value::FeatureValue};
use signalfleet_stats::{descriptive::DescriptiveStats, percentiles::Percentiles};
use signalfleet_store::{
    ModelBundle, ModelFamily, ModelStore,
    family::{CohortModel, CohortRanges, MetricRange, RANGES_FILE},
    metadata::{CohortMetrics, FamilyMetrics},
};

use crate::{
    TrainingConfig, TrainingError, fit_error,
    harness::{self, TrainedVersion},
};

/// A cohort only gets a range for a metric observed on at least this many members.
pub const MIN_RANGE_VALUES: usize = 5;

pub fn train(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
    config: &TrainingConfig,
) -> Result<TrainedVersion, TrainingError> {
    let family = ModelFamily::Cohort;
    harness::require_examples(family, examples, config)?;

    let keys = family.feature_keys(schema);
    let rows = harness::encode(schema, &keys, examples);
    let scaler = StandardScaler::fit(&rows).map_err(fit_error(family))?;
    let scaled = scaler.transform(&rows).map_err(fit_error(family))?;
    let kmeans = KMeans::fit(&scaled, &config.kmeans_params()).map_err(fit_error(family))?;
    let labels = kmeans.predict_batch(&scaled).map_err(fit_error(family))?;

    let assessment = cohort::assess(&scaled, &labels, &config.assessment_params())
        .map_err(fit_error(family))?;
    tracing::debug!(
        silhouette = ?assessment.silhouette,
        stability = ?assessment.stability,
        outlier_rate = assessment.outlier_rate,
        "assessed cohorts"
    );
    let metrics = FamilyMetrics::Cohort(CohortMetrics {
        clusters: kmeans.cluster_count(),
        silhouette: assessment.silhouette,
        stability: assessment.stability,
        outlier_rate: assessment.outlier_rate,
        min_cluster_size: assessment.min_cluster_size,
        cluster_sizes: assessment.cluster_sizes,
        inertia: kmeans.inertia(),
    });

    let ranges = expected_ranges(examples, &labels, &config.benchmark_metrics);
    let record = harness::record(schema, keys, examples, examples.len(), 0, metrics);
    let bundle = ModelBundle::new(family, &CohortModel { scaler, kmeans }, record.clone())?
        .with_artifact(RANGES_FILE, &ranges)?;
    TrainedVersion::publish(store, &bundle, record)
}

/// Per-cohort spread of each metric among the cohort's members.
///
/// Only finite numeric feature values count. Cohorts without members get
/// no entry; metrics with fewer than [`MIN_RANGE_VALUES`] values are left
/// out of a cohort's list.
#[must_use]
pub fn expected_ranges(
    examples: &[TrainingExample],
    labels: &[usize],
    metrics: &[String],
) -> CohortRanges {
    let mut members = BTreeMap::<usize, Vec<&TrainingExample>>::new();
    for (example, &label) in examples.iter().zip(labels) {
        members.entry(label).or_default().push(example);
    }

    members
        .into_iter()
        .map(|(cohort_id, members)| {
            let ranges = metrics
                .iter()
                .filter_map(|metric| metric_range(metric, &members))
                .collect();
            (cohort_id, ranges)
        })
        .collect()
}

fn metric_range(metric: &str, members: &[&TrainingExample]) -> Option<MetricRange> {
    let values = members
        .iter()
        .filter_map(|example| match example.features.get(metric) {
            Some(FeatureValue::Number(value)) if value.is_finite() => Some(*value),
            _ => None,
        })
        .collect::<Vec<_>>();
    if values.len() < MIN_RANGE_VALUES {
        return None;
    }
    let stats = DescriptiveStats::new(values.iter().copied())?;
    let quartiles = Percentiles::new(&values, &[25.0, 75.0]);
    Some(MetricRange {
        metric_key: metric.to_owned(),
        min: stats.min,
        max: stats.max,
        median: stats.median,
        p25: quartiles.get(25.0)?,
        p75: quartiles.get(75.0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{example_set, schema};

    fn config() -> TrainingConfig {
        TrainingConfig {
            clusters: 2,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_two_groups_become_two_cohorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = example_set(20, false, false);

        let trained = train(&store, &schema(), &examples, &config()).unwrap();
        let FamilyMetrics::Cohort(metrics) = &trained.metrics else {
            panic!("unexpected metrics {:?}", trained.metrics);
        };
        assert_eq!(metrics.cluster_sizes, vec![10, 10]);
        assert!(metrics.silhouette.unwrap() > 0.8);
        assert_eq!(metrics.stability, None);
        assert_eq!(trained.validation_examples, 0);

        let metadata = store.read_metadata(ModelFamily::Cohort, &trained.version).unwrap();
        assert_eq!(metadata.record.feature_keys, ["avg_job_value", "total_jobs"]);
        assert!(metadata.record.categorical_encoders.is_empty());

        let ranges: CohortRanges = store
            .read_side_artifact(ModelFamily::Cohort, &trained.version, RANGES_FILE)
            .unwrap();
        assert_eq!(ranges.len(), 2);
        for cohort_ranges in ranges.values() {
            let keys = cohort_ranges
                .iter()
                .map(|r| r.metric_key.as_str())
                .collect::<Vec<_>>();
            assert_eq!(keys, ["avg_job_value", "total_jobs"]);
        }
    }

    #[test]
    fn test_ranges_need_five_values() {
        let examples = example_set(12, false, false);
        let labels = vec![0; 12];
        let mut sparse = examples.clone();
        for example in sparse.iter_mut().skip(4) {
            example.features.remove("total_jobs");
        }

        let metrics = vec!["avg_job_value".to_owned(), "total_jobs".to_owned()];
        let ranges = expected_ranges(&sparse, &labels, &metrics);
        assert_eq!(ranges[&0].len(), 1);
        assert_eq!(ranges[&0][0].metric_key, "avg_job_value");

        let range = &expected_ranges(&examples, &labels, &metrics)[&0][1];
        // total_jobs: 10.0, 60.1, 10.2, ..., 61.1
        assert!((range.min - 10.0).abs() < 1e-9);
        assert!((range.max - 61.1).abs() < 1e-9);
        assert!(range.p25 <= range.median && range.median <= range.p75);
    }

    #[test]
    fn test_rejects_small_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let result = train(&store, &schema(), &example_set(9, false, false), &config());
        assert!(matches!(
            result,
            Err(TrainingError::InsufficientData {
                required: 10,
                found: 9,
                ..
            })
        ));
    }

    #[test]
    fn test_more_clusters_than_examples_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let config = TrainingConfig {
            clusters: 12,
            ..config()
        };
        let result = train(&store, &schema(), &example_set(10, false, false), &config);
        assert!(matches!(
            result,
            Err(TrainingError::InsufficientData {
                required: 12,
                found: 10,
                ..
            })
        ));
        assert!(result.unwrap_err().is_skippable());
    }
}
