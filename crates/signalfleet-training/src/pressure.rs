//! Pressure selector family: one-vs-rest logistic regression over the tag universe.

use signalfleet_estimators::logistic::OneVsRestLogistic;
use signalfleet_evaluator::{
    metrics,
    targets::{self, DataSplit},
};
use signalfleet_features::{example::TrainingExample, schema::FeatureSchema};
use signalfleet_store::{
    ModelBundle, ModelFamily, ModelStore,
    family::PRESSURE_KEYS_FILE,
    metadata::{FamilyMetrics, PressureMetrics},
};

use crate::{
    TrainingConfig, TrainingError, fit_error,
    harness::{self, TrainedVersion},
};

pub fn train(
    store: &ModelStore,
    schema: &FeatureSchema,
    examples: &[TrainingExample],
    config: &TrainingConfig,
) -> Result<TrainedVersion, TrainingError> {
    let family = ModelFamily::PressureSelector;
    harness::require_examples(family, examples, config)?;

    let tags = targets::pressure_tag_universe(examples);
    if tags.is_empty() {
        return Err(TrainingError::NoTargets { family });
    }
    let keys = family.feature_keys(schema);
    let rows = harness::encode(schema, &keys, examples);
    let active = examples
        .iter()
        .map(|example| targets::active_tags(example, &tags))
        .collect::<Vec<_>>();
    let split = DataSplit::new(examples.len(), config.validation_fraction, config.seed);

    let model = OneVsRestLogistic::fit(
        &targets::select(&rows, &split.train),
        &targets::select(&active, &split.train),
        tags.len(),
        &config.logistic,
    )
    .map_err(fit_error(family))?;

    let scores = split
        .validation
        .iter()
        .map(|&i| model.predict_scores(&rows[i]))
        .collect::<Result<Vec<_>, _>>()
        .map_err(fit_error(family))?;
    let score = metrics::precision_recall_at_k(
        &targets::select(&active, &split.validation),
        &scores,
        config.top_k,
    );
    let metrics = FamilyMetrics::PressureSelector(PressureMetrics {
        k: config.top_k,
        tag_count: tags.len(),
        precision_at_k: score.precision_at_k,
        recall_at_k: score.recall_at_k,
        f1_at_k: score.f1(),
        scored_examples: score.scored_examples,
    });

    let record = harness::record(
        schema,
        keys,
        examples,
        split.train.len(),
        split.validation.len(),
        metrics,
    );
    let bundle = ModelBundle::new(family, &model, record.clone())?
        .with_artifact(PRESSURE_KEYS_FILE, &tags)?;
    TrainedVersion::publish(store, &bundle, record)
}
