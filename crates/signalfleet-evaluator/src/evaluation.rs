//! Scoring of the newest version of every family against a labelled dataset.
//!
//! Each family is evaluated independently. A family with no trained version,
//! or whose artifacts cannot be read or scored, is recorded in
//! [`EvaluationSummary::skipped`] and the others carry on. A version trained
//! against a different feature schema aborts the whole run.

use std::{borrow::Cow, collections::BTreeMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalfleet_estimators::{
    EstimatorError, logistic::OneVsRestLogistic, ridge::RidgeRegression,
    softmax::SoftmaxRegression,
};
use signalfleet_features::{
    codec, dataset::DatasetSummary, example::TrainingExample, schema::FeatureSchema,
};
use signalfleet_store::{
    ModelFamily, ModelStore, StoreError, VersionId,
    family::{CLASS_NAMES_FILE, CohortModel, PRESSURE_KEYS_FILE},
    metadata::{CohortQuality, FamilyMetrics, ModelMetadata},
};

use crate::{
    cohort::{self, AssessmentParams, CohortAssessment},
    gate::{self, GateConfig, GateDecision, GateInputs},
    metrics::{self, ConfusionMatrix, RankingScore},
    targets::{self, BoundaryClass, DataSplit},
};

/// Which examples of the dataset are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSplit {
    /// Every example.
    #[default]
    Full,
    /// The validation part of the deterministic train/validation split.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub split: EvaluationSplit,
    pub validation_fraction: f64,
    pub seed: u64,
    /// Cohort stability is only measured with at least this many examples.
    pub min_stability_examples: usize,
    /// Lloyd iteration cap for the cohort stability refits.
    pub max_iterations: usize,
    pub gate: GateConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            split: EvaluationSplit::Full,
            validation_fraction: 0.2,
            seed: 42,
            min_stability_examples: 100,
            max_iterations: 300,
            gate: GateConfig::default(),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EvaluationError {
    #[display("no examples to evaluate")]
    EmptyDataset,
    #[display("no trained {family} model")]
    NoVersion { family: ModelFamily },
    #[display("{family} model {version} was trained against a different feature schema")]
    SchemaMismatch {
        family: ModelFamily,
        version: VersionId,
    },
    #[display("model store error")]
    Store { source: StoreError },
    #[display("failed to score the {family} model")]
    Estimator {
        family: ModelFamily,
        source: EstimatorError,
    },
}

impl From<StoreError> for EvaluationError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

/// The version a family's evaluated version is compared with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousVersion {
    pub version: VersionId,
    /// Metrics recorded when that version was trained.
    pub metrics: FamilyMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortEvaluation {
    pub version: VersionId,
    pub previous: Option<PreviousVersion>,
    pub examples: usize,
    #[serde(flatten)]
    pub assessment: CohortAssessment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureEvaluation {
    pub version: VersionId,
    pub previous: Option<PreviousVersion>,
    pub k: usize,
    #[serde(flatten)]
    pub score: RankingScore,
    pub f1_at_k: f64,
    pub by_category: BTreeMap<String, RankingScore>,
    /// Predicted tags that were not true, most frequent first.
    pub false_positives: Vec<TagCount>,
    /// True tags that were not predicted, most frequent first.
    pub false_negatives: Vec<TagCount>,
}

impl PressureEvaluation {
    /// Precision@k the previous version recorded at training time.
    #[must_use]
    pub fn previous_precision_at_k(&self) -> Option<f64> {
        self.previous
            .as_ref()
            .and_then(|previous| previous.metrics.as_pressure())
            .map(|metrics| metrics.precision_at_k)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryBreakdown {
    pub examples: usize,
    pub accuracy: f64,
    pub false_safe_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEvaluation {
    pub version: VersionId,
    pub previous: Option<PreviousVersion>,
    pub accuracy: f64,
    pub false_safe_rate: f64,
    pub by_category: BTreeMap<String, BoundaryBreakdown>,
    pub confusion: ConfusionMatrix,
    /// Share of low mapping confidence examples not predicted `confirm_mappings`.
    pub low_confidence_mismatch_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratorEvaluation {
    pub version: VersionId,
    pub previous: Option<PreviousVersion>,
    /// Examples with at least one observed benchmark percentile.
    pub scored_examples: usize,
    pub mae: Option<f64>,
    pub residual_std: Option<f64>,
    pub mae_by_source: BTreeMap<String, f64>,
    pub by_category: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFamily {
    pub family: ModelFamily,
    pub reason: String,
}

/// Everything one evaluation run measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluated_at: DateTime<Utc>,
    pub split: EvaluationSplit,
    /// Composition of the whole dataset, before splitting.
    pub dataset: DatasetSummary,
    pub evaluated_examples: usize,
    pub cohort: Option<CohortEvaluation>,
    pub pressure_selector: Option<PressureEvaluation>,
    pub boundary_classifier: Option<BoundaryEvaluation>,
    pub calibrator: Option<CalibratorEvaluation>,
    pub skipped: Vec<SkippedFamily>,
    pub gate: GateDecision,
}

/// Evaluates the newest version of every family and applies the regression gate.
///
/// The cohort family's quality is written back into its version metadata.
pub fn evaluate(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
    config: &EvaluationConfig,
) -> Result<EvaluationSummary, EvaluationError> {
    let evaluated_at = Utc::now();
    let dataset = DatasetSummary::new(examples);
    let scored: Cow<'_, [TrainingExample]> = match config.split {
        EvaluationSplit::Full => Cow::Borrowed(examples),
        EvaluationSplit::Validation => {
            let split = DataSplit::new(examples.len(), config.validation_fraction, config.seed);
            Cow::Owned(targets::select(examples, &split.validation))
        }
    };
    if scored.is_empty() {
        return Err(EvaluationError::EmptyDataset);
    }
    tracing::info!(
        examples = scored.len(),
        split = ?config.split,
        "evaluating model fleet"
    );

    let mut skipped = vec![];
    let cohort = settle(
        ModelFamily::Cohort,
        evaluate_cohort(store, schema, &scored, config, evaluated_at),
        &mut skipped,
    )?;
    let pressure_selector = settle(
        ModelFamily::PressureSelector,
        evaluate_pressure(store, schema, &scored, &config.gate),
        &mut skipped,
    )?;
    let boundary_classifier = settle(
        ModelFamily::BoundaryClassifier,
        evaluate_boundary(store, schema, &scored),
        &mut skipped,
    )?;
    let calibrator = settle(
        ModelFamily::Calibrator,
        evaluate_calibrator(store, schema, &scored),
        &mut skipped,
    )?;

    let gate = gate::decide(
        &config.gate,
        &GateInputs {
            false_safe_rate: boundary_classifier.as_ref().map(|b| b.false_safe_rate),
            precision_at_k: pressure_selector.as_ref().map(|p| p.score.precision_at_k),
            previous_precision_at_k: pressure_selector
                .as_ref()
                .and_then(PressureEvaluation::previous_precision_at_k),
        },
    );
    tracing::info!(status = %gate.status, details = ?gate.details, "regression gate decided");

    Ok(EvaluationSummary {
        evaluated_at,
        split: config.split,
        dataset,
        evaluated_examples: scored.len(),
        cohort,
        pressure_selector,
        boundary_classifier,
        calibrator,
        skipped,
        gate,
    })
}

/// Turns a per-family failure into a skip, except for schema mismatches.
fn settle<T>(
    family: ModelFamily,
    outcome: Result<T, EvaluationError>,
    skipped: &mut Vec<SkippedFamily>,
) -> Result<Option<T>, EvaluationError> {
    match outcome {
        Ok(evaluation) => Ok(Some(evaluation)),
        Err(e @ EvaluationError::SchemaMismatch { .. }) => Err(e),
        Err(e) => {
            let reason = error_chain(&e);
            tracing::warn!(%family, %reason, "skipping family");
            skipped.push(SkippedFamily { family, reason });
            Ok(None)
        }
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

struct LoadedVersion {
    version: VersionId,
    metadata: ModelMetadata,
    previous: Option<PreviousVersion>,
}

impl LoadedVersion {
    /// Loads the newest version of `family` and checks it against `schema`.
    fn newest(
        store: &ModelStore,
        schema: &FeatureSchema,
        family: ModelFamily,
    ) -> Result<Self, EvaluationError> {
        let version = store
            .latest_version(family)?
            .ok_or(EvaluationError::NoVersion { family })?;
        let metadata = store.read_metadata(family, &version)?;
        if !metadata.record.matches_schema(family, schema) {
            return Err(EvaluationError::SchemaMismatch { family, version });
        }
        let previous = match store.previous_version(family, &version)? {
            Some(previous) => Some(PreviousVersion {
                metrics: store.read_metrics(family, &previous)?.metrics,
                version: previous,
            }),
            None => None,
        };
        tracing::debug!(%family, %version, "loaded version for evaluation");
        Ok(Self {
            version,
            metadata,
            previous,
        })
    }

    fn encode(&self, examples: &[TrainingExample]) -> Vec<Vec<f64>> {
        codec::encode_batch_with_keys(
            &self.metadata.record.feature_keys,
            &self.metadata.record.categorical_encoders,
            examples.iter().map(|example| &example.features),
        )
    }
}

fn scoring_error(family: ModelFamily) -> impl FnOnce(EstimatorError) -> EvaluationError {
    move |source| EvaluationError::Estimator { family, source }
}

/// Example indices grouped by category.
fn by_category(examples: &[TrainingExample]) -> BTreeMap<String, Vec<usize>> {
    let mut groups = BTreeMap::<String, Vec<usize>>::new();
    for (i, example) in examples.iter().enumerate() {
        groups.entry(example.category.clone()).or_default().push(i);
    }
    groups
}

fn evaluate_cohort(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
    config: &EvaluationConfig,
    evaluated_at: DateTime<Utc>,
) -> Result<CohortEvaluation, EvaluationError> {
    let family = ModelFamily::Cohort;
    let loaded = LoadedVersion::newest(store, schema, family)?;
    let model = store.load_estimator::<CohortModel>(family, &loaded.version)?;

    let scaled = model
        .scaler
        .transform(&loaded.encode(examples))
        .map_err(scoring_error(family))?;
    let labels = model
        .kmeans
        .predict_batch(&scaled)
        .map_err(scoring_error(family))?;
    let assessment = cohort::assess(
        &scaled,
        &labels,
        &AssessmentParams {
            clusters: model.kmeans.cluster_count(),
            seed: config.seed,
            max_iterations: config.max_iterations,
            min_stability_examples: config.min_stability_examples,
        },
    )
    .map_err(scoring_error(family))?;

    store.patch_cohort_quality(
        &loaded.version,
        &CohortQuality {
            silhouette: assessment.silhouette,
            stability: assessment.stability,
            outlier_rate: assessment.outlier_rate,
            min_cluster_size: assessment.min_cluster_size,
            evaluated_examples: examples.len(),
            evaluated_at,
        },
    )?;

    Ok(CohortEvaluation {
        version: loaded.version,
        previous: loaded.previous,
        examples: examples.len(),
        assessment,
    })
}

fn evaluate_pressure(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
    config: &GateConfig,
) -> Result<PressureEvaluation, EvaluationError> {
    let family = ModelFamily::PressureSelector;
    let loaded = LoadedVersion::newest(store, schema, family)?;
    let model = store.load_estimator::<OneVsRestLogistic>(family, &loaded.version)?;
    let tags =
        store.read_side_artifact::<Vec<String>>(family, &loaded.version, PRESSURE_KEYS_FILE)?;

    let scores = loaded
        .encode(examples)
        .iter()
        .map(|row| model.predict_scores(row))
        .collect::<Result<Vec<_>, _>>()
        .map_err(scoring_error(family))?;
    let truth = examples
        .iter()
        .map(|example| targets::active_tags(example, &tags))
        .collect::<Vec<_>>();

    let k = config.top_k;
    let score = metrics::precision_recall_at_k(&truth, &scores, k);
    let by_category = by_category(examples)
        .into_iter()
        .map(|(category, indices)| {
            let truth = targets::select(&truth, &indices);
            let scores = targets::select(&scores, &indices);
            (category, metrics::precision_recall_at_k(&truth, &scores, k))
        })
        .collect();

    let mut false_positives = TagTally::default();
    let mut false_negatives = TagTally::default();
    for (true_tags, row) in truth.iter().zip(&scores) {
        let predicted = metrics::top_k_indices(row, k);
        for &i in predicted.iter().filter(|i| !true_tags.contains(i)) {
            false_positives.add(&tags[i]);
        }
        for &i in true_tags.iter().filter(|i| !predicted.contains(i)) {
            false_negatives.add(&tags[i]);
        }
    }

    Ok(PressureEvaluation {
        version: loaded.version,
        previous: loaded.previous,
        k,
        f1_at_k: score.f1(),
        score,
        by_category,
        false_positives: false_positives.top(config.top_confusions),
        false_negatives: false_negatives.top(config.top_confusions),
    })
}

/// Tag counts in first-seen order.
#[derive(Default)]
struct TagTally(Vec<TagCount>);

impl TagTally {
    fn add(&mut self, tag: &str) {
        match self.0.iter_mut().find(|entry| entry.tag == tag) {
            Some(entry) => entry.count += 1,
            None => self.0.push(TagCount {
                tag: tag.to_owned(),
                count: 1,
            }),
        }
    }

    /// The `n` most frequent tags; equal counts keep first-seen order.
    fn top(mut self, n: usize) -> Vec<TagCount> {
        self.0.sort_by(|a, b| b.count.cmp(&a.count));
        self.0.truncate(n);
        self.0
    }
}

#[expect(clippy::cast_precision_loss)]
fn evaluate_boundary(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
) -> Result<BoundaryEvaluation, EvaluationError> {
    let family = ModelFamily::BoundaryClassifier;
    let loaded = LoadedVersion::newest(store, schema, family)?;
    let model = store.load_estimator::<SoftmaxRegression>(family, &loaded.version)?;
    let class_names =
        store.read_side_artifact::<Vec<String>>(family, &loaded.version, CLASS_NAMES_FILE)?;

    let predicted = loaded
        .encode(examples)
        .iter()
        .map(|row| {
            let index = model.predict(row)?;
            Ok(BoundaryClass::from_label(
                class_names.get(index).map(String::as_str),
            ))
        })
        .collect::<Result<Vec<_>, EstimatorError>>()
        .map_err(scoring_error(family))?;
    let truth = examples
        .iter()
        .map(targets::boundary_class)
        .collect::<Vec<_>>();

    let by_category = by_category(examples)
        .into_iter()
        .map(|(category, indices)| {
            let truth = targets::select(&truth, &indices);
            let predicted = targets::select(&predicted, &indices);
            let breakdown = BoundaryBreakdown {
                examples: indices.len(),
                accuracy: metrics::accuracy(&truth, &predicted),
                false_safe_rate: metrics::false_safe_rate(&truth, &predicted),
            };
            (category, breakdown)
        })
        .collect();

    let (low_confidence, mismatched) = examples
        .iter()
        .zip(&predicted)
        .filter(|(example, _)| targets::has_low_mapping_confidence(example))
        .fold((0_usize, 0_usize), |(total, mismatched), (_, class)| {
            let mismatch = *class != BoundaryClass::ConfirmMappings;
            (total + 1, mismatched + usize::from(mismatch))
        });
    let low_confidence_mismatch_rate = if low_confidence == 0 {
        0.0
    } else {
        mismatched as f64 / low_confidence as f64
    };

    Ok(BoundaryEvaluation {
        version: loaded.version,
        previous: loaded.previous,
        accuracy: metrics::accuracy(&truth, &predicted),
        false_safe_rate: metrics::false_safe_rate(&truth, &predicted),
        by_category,
        confusion: ConfusionMatrix::new(&truth, &predicted),
        low_confidence_mismatch_rate,
    })
}

fn evaluate_calibrator(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
) -> Result<CalibratorEvaluation, EvaluationError> {
    let family = ModelFamily::Calibrator;
    let loaded = LoadedVersion::newest(store, schema, family)?;
    let model = store.load_estimator::<RidgeRegression>(family, &loaded.version)?;
    let rows = loaded.encode(examples);

    // only examples with an observed percentile are scored
    let mut observed = vec![];
    for (example, row) in examples.iter().zip(&rows) {
        if let Some(target) = example.mean_benchmark_percentile() {
            let prediction = model.predict(row).map_err(scoring_error(family))?;
            observed.push((example, target, prediction));
        }
    }

    let grouped_mae = |key: fn(&TrainingExample) -> &str| {
        let mut groups = BTreeMap::<String, (Vec<f64>, Vec<f64>)>::new();
        for (example, target, prediction) in &observed {
            let (truth, predicted) = groups.entry(key(example).to_owned()).or_default();
            truth.push(*target);
            predicted.push(*prediction);
        }
        groups
            .into_iter()
            .filter_map(|(group, (truth, predicted))| {
                metrics::mean_absolute_error(&truth, &predicted).map(|mae| (group, mae))
            })
            .collect::<BTreeMap<_, _>>()
    };
    let mae_by_source = grouped_mae(|example| example.source.as_str());
    let by_category = grouped_mae(|example| example.category.as_str());

    let truth = observed.iter().map(|(_, t, _)| *t).collect::<Vec<_>>();
    let predicted = observed.iter().map(|(_, _, p)| *p).collect::<Vec<_>>();
    Ok(CalibratorEvaluation {
        version: loaded.version,
        previous: loaded.previous,
        scored_examples: observed.len(),
        mae: metrics::mean_absolute_error(&truth, &predicted),
        residual_std: metrics::residual_std(&truth, &predicted),
        mae_by_source,
        by_category,
    })
}

#[cfg(test)]
mod tests {
    use signalfleet_estimators::{
        kmeans::{KMeans, KMeansParams},
        logistic::LogisticParams,
        scaler::StandardScaler,
    };
    use signalfleet_features::schema::CategoricalEncoders;
    use signalfleet_store::{
        ModelBundle,
        metadata::{
            BoundaryMetrics, CalibratorMetrics, CohortMetrics, PressureMetrics, TrainingRecord,
        },
    };

    use super::*;
    use crate::gate::GateStatus;

    fn schema() -> FeatureSchema {
        FeatureSchema::new("test_v1", ["x", "y"], CategoricalEncoders::new()).unwrap()
    }

    fn record(schema: &FeatureSchema, metrics: FamilyMetrics) -> TrainingRecord {
        TrainingRecord {
            schema_version: schema.version().to_owned(),
            schema_hash: schema.hash().to_owned(),
            feature_keys: schema.keys().to_vec(),
            categorical_encoders: CategoricalEncoders::new(),
            dataset_fingerprint: String::new(),
            training_examples: 10,
            validation_examples: 2,
            metrics,
        }
    }

    fn example(id: usize, x: f64, extra: &str) -> TrainingExample {
        let json = format!(
            r#"{{"id": "ex-{id}", "source": "{}", "category": "{}", "features": {{"x": {x}, "y": {}}}, "targets": {{{extra}}}}}"#,
            if id % 2 == 0 { "mock" } else { "real" },
            if x < 0.0 { "hvac" } else { "plumbing" },
            -x,
        );
        serde_json::from_str(&json).unwrap()
    }

    fn boundary_examples() -> Vec<TrainingExample> {
        [-3.0, -2.5, -2.0, -1.5, 1.5, 2.0, 2.5, 3.0]
            .into_iter()
            .enumerate()
            .map(|(i, x)| {
                let class = if x < 0.0 { "needs_followup" } else { "stable" };
                example(i, x, &format!(r#""boundary_class": "{class}""#))
            })
            .collect()
    }

    fn rows(examples: &[TrainingExample]) -> Vec<Vec<f64>> {
        codec::encode_batch(&schema(), examples.iter().map(|e| &e.features))
    }

    fn publish_boundary(store: &ModelStore, examples: &[TrainingExample]) -> VersionId {
        let labels = examples
            .iter()
            .map(|e| targets::boundary_class(e).index())
            .collect::<Vec<_>>();
        let model = SoftmaxRegression::fit(
            &rows(examples),
            &labels,
            BoundaryClass::names(),
            &LogisticParams::default(),
        )
        .unwrap();
        let metrics = FamilyMetrics::BoundaryClassifier(BoundaryMetrics {
            accuracy: 1.0,
            false_safe_rate: 0.0,
        });
        let bundle = ModelBundle::new(ModelFamily::BoundaryClassifier, &model, record(&schema(), metrics))
            .unwrap()
            .with_artifact(CLASS_NAMES_FILE, &BoundaryClass::names())
            .unwrap();
        store.write_version(&bundle).unwrap()
    }

    #[test]
    fn test_missing_families_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = boundary_examples();
        let version = publish_boundary(&store, &examples);

        let summary = evaluate(&store, &schema(), &examples, &EvaluationConfig::default()).unwrap();
        let boundary = summary.boundary_classifier.unwrap();
        assert_eq!(boundary.version, version);
        assert_eq!(boundary.accuracy, 1.0);
        assert_eq!(boundary.false_safe_rate, 0.0);
        assert!(boundary.previous.is_none());
        assert_eq!(
            boundary.confusion.counts.iter().flatten().sum::<usize>(),
            examples.len()
        );
        assert_eq!(boundary.by_category["hvac"].examples, 4);
        // no example carries a mapping confidence level, none is predicted confirm_mappings
        assert_eq!(boundary.low_confidence_mismatch_rate, 1.0);

        let skipped = summary
            .skipped
            .iter()
            .map(|s| s.family)
            .collect::<Vec<_>>();
        assert_eq!(
            skipped,
            [
                ModelFamily::Cohort,
                ModelFamily::PressureSelector,
                ModelFamily::Calibrator
            ]
        );
        assert_eq!(summary.gate.status, GateStatus::Pass);
        assert_eq!(summary.dataset.total, 8);
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = boundary_examples();
        publish_boundary(&store, &examples);

        let other = FeatureSchema::new("test_v1", ["y", "x"], CategoricalEncoders::new()).unwrap();
        let result = evaluate(&store, &other, &examples, &EvaluationConfig::default());
        assert!(matches!(
            result,
            Err(EvaluationError::SchemaMismatch {
                family: ModelFamily::BoundaryClassifier,
                ..
            })
        ));
    }

    #[test]
    fn test_pressure_regression_against_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = (0..8)
            .map(|i| {
                let x = f64::from(u8::try_from(i).unwrap()) - 3.5;
                let tag = if x < 0.0 { "tag_low" } else { "tag_high" };
                example(i, x, &format!(r#""pressure_keys": ["{tag}"]"#))
            })
            .collect::<Vec<_>>();
        let tags = targets::pressure_tag_universe(&examples);
        let active = examples
            .iter()
            .map(|e| targets::active_tags(e, &tags))
            .collect::<Vec<_>>();
        let model =
            OneVsRestLogistic::fit(&rows(&examples), &active, tags.len(), &LogisticParams::default())
                .unwrap();

        // with two tags and k = 3 precision is capped at 1/3
        for recorded in [1.0, 0.3] {
            let metrics = FamilyMetrics::PressureSelector(PressureMetrics {
                k: 3,
                tag_count: tags.len(),
                precision_at_k: recorded,
                recall_at_k: 1.0,
                f1_at_k: 0.5,
                scored_examples: 2,
            });
            let bundle = ModelBundle::new(ModelFamily::PressureSelector, &model, record(&schema(), metrics))
                .unwrap()
                .with_artifact(PRESSURE_KEYS_FILE, &tags)
                .unwrap();
            store.write_version(&bundle).unwrap();
        }

        let summary = evaluate(&store, &schema(), &examples, &EvaluationConfig::default()).unwrap();
        let pressure = summary.pressure_selector.unwrap();
        assert!((pressure.score.precision_at_k - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(pressure.score.recall_at_k, 1.0);
        assert_eq!(pressure.previous_precision_at_k(), Some(1.0));
        assert!(pressure.false_negatives.is_empty());
        // every example predicts its other tag as well
        assert_eq!(pressure.false_positives.len(), 2);
        assert_eq!(pressure.false_positives[0].count, 4);
        assert_eq!(summary.gate.status, GateStatus::Fail);
        assert_eq!(summary.gate.details.len(), 1);
        assert!(summary.gate.details[0].starts_with("precision@3 drop 0.667"));
    }

    #[test]
    fn test_calibrator_scores_observed_percentiles_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let mut examples = (0..10)
            .map(|i| {
                let x = f64::from(u8::try_from(i).unwrap());
                let percentile = 10.0 + 5.0 * x;
                example(i, x, &format!(r#""benchmark": [{{"percentile": {percentile}}}]"#))
            })
            .collect::<Vec<_>>();
        examples.push(example(10, 1.0, ""));

        let observed = &examples[..10];
        let targets = observed
            .iter()
            .map(targets::calibrator_target)
            .collect::<Vec<_>>();
        let model = RidgeRegression::fit(&rows(observed), &targets, 1.0).unwrap();
        let metrics = FamilyMetrics::Calibrator(CalibratorMetrics { mae: 0.5 });
        let bundle = ModelBundle::new(ModelFamily::Calibrator, &model, record(&schema(), metrics)).unwrap();
        store.write_version(&bundle).unwrap();

        let summary = evaluate(&store, &schema(), &examples, &EvaluationConfig::default()).unwrap();
        let calibrator = summary.calibrator.unwrap();
        assert_eq!(calibrator.scored_examples, 10);
        assert!(calibrator.mae.unwrap() < 5.0);
        assert!(calibrator.residual_std.is_some());
        assert_eq!(
            calibrator.mae_by_source.keys().collect::<Vec<_>>(),
            ["mock", "real"]
        );
        assert_eq!(
            calibrator.by_category.keys().collect::<Vec<_>>(),
            ["plumbing"]
        );
        assert_eq!(summary.gate.status, GateStatus::Pass);
    }

    #[test]
    fn test_cohort_quality_is_patched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = (0..12)
            .map(|i| {
                let x = if i % 2 == 0 { -4.0 } else { 4.0 };
                example(i, x + f64::from(u8::try_from(i).unwrap()) * 0.01, "")
            })
            .collect::<Vec<_>>();
        let encoded = rows(&examples);
        let scaler = StandardScaler::fit(&encoded).unwrap();
        let kmeans = KMeans::fit(
            &scaler.transform(&encoded).unwrap(),
            &KMeansParams {
                clusters: 2,
                ..KMeansParams::default()
            },
        )
        .unwrap();
        let metrics = FamilyMetrics::Cohort(CohortMetrics {
            clusters: 2,
            silhouette: None,
            stability: None,
            outlier_rate: 1.0,
            min_cluster_size: 6,
            cluster_sizes: vec![6, 6],
            inertia: kmeans.inertia(),
        });
        let model = CohortModel { scaler, kmeans };
        let bundle = ModelBundle::new(ModelFamily::Cohort, &model, record(&schema(), metrics)).unwrap();
        let version = store.write_version(&bundle).unwrap();

        let summary = evaluate(&store, &schema(), &examples, &EvaluationConfig::default()).unwrap();
        let cohort = summary.cohort.unwrap();
        assert_eq!(cohort.assessment.min_cluster_size, 6);
        assert_eq!(cohort.assessment.stability, None);
        assert!(cohort.assessment.silhouette.unwrap() > 0.9);

        let metadata = store.read_metadata(ModelFamily::Cohort, &version).unwrap();
        let quality = metadata.cohort_quality.unwrap();
        assert_eq!(quality.evaluated_examples, 12);
        assert_eq!(quality.min_cluster_size, 6);
    }

    #[test]
    fn test_validation_split_scores_fewer_examples() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let examples = boundary_examples();
        publish_boundary(&store, &examples);

        let config = EvaluationConfig {
            split: EvaluationSplit::Validation,
            ..EvaluationConfig::default()
        };
        let summary = evaluate(&store, &schema(), &examples, &config).unwrap();
        assert_eq!(summary.evaluated_examples, 2);
        assert_eq!(summary.dataset.total, 8);
    }

    #[test]
    fn test_tag_tally_keeps_first_seen_order_on_ties() {
        let mut tally = TagTally::default();
        for tag in ["b", "a", "c", "a", "c"] {
            tally.add(tag);
        }
        let top = tally.top(2);
        assert_eq!(top[0].tag, "a");
        assert_eq!(top[1].tag, "c");
    }
}
