//! Calibrator family: ridge regression onto the mean benchmark percentile.
//!
//! Examples without an observed percentile train toward the neutral
//! [`DEFAULT_PERCENTILE`](signalfleet_evaluator::targets::DEFAULT_PERCENTILE).

use signalfleet_estimators::ridge::RidgeRegression;
use signalfleet_evaluator::{
    metrics,
    targets::{self, DataSplit},
};
use signalfleet_features::{example::TrainingExample, schema::FeatureSchema};
use signalfleet_store::{
    ModelBundle, ModelFamily, ModelStore,
    metadata::{CalibratorMetrics, FamilyMetrics},
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
    let family = ModelFamily::Calibrator;
    harness::require_examples(family, examples, config)?;
    if examples
        .iter()
        .all(|example| example.mean_benchmark_percentile().is_none())
    {
        return Err(TrainingError::NoTargets { family });
    }

    let keys = family.feature_keys(schema);
    let rows = harness::encode(schema, &keys, examples);
    let target = examples
        .iter()
        .map(targets::calibrator_target)
        .collect::<Vec<_>>();
    let split = DataSplit::new(examples.len(), config.validation_fraction, config.seed);

    let model = RidgeRegression::fit(
        &targets::select(&rows, &split.train),
        &targets::select(&target, &split.train),
        config.ridge_alpha,
    )
    .map_err(fit_error(family))?;

    let predicted = split
        .validation
        .iter()
        .map(|&i| model.predict(&rows[i]))
        .collect::<Result<Vec<_>, _>>()
        .map_err(fit_error(family))?;
    let mae = metrics::mean_absolute_error(&targets::select(&target, &split.validation), &predicted)
        .unwrap_or(0.0);
    let metrics = FamilyMetrics::Calibrator(CalibratorMetrics { mae });

    let record = harness::record(
        schema,
        keys,
        examples,
        split.train.len(),
        split.validation.len(),
        metrics,
    );
    let bundle = ModelBundle::new(family, &model, record.clone())?;
    TrainedVersion::publish(store, &bundle, record)
}
