//! Boundary classifier family: softmax regression over the closed class set.

use signalfleet_estimators::{EstimatorError, softmax::SoftmaxRegression};
use signalfleet_evaluator::{
    metrics,
    targets::{self, BoundaryClass, DataSplit},
};
use signalfleet_features::{example::TrainingExample, schema::FeatureSchema};
use signalfleet_store::{
    ModelBundle, ModelFamily, ModelStore,
    family::CLASS_NAMES_FILE,
    metadata::{BoundaryMetrics, FamilyMetrics},
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
    let family = ModelFamily::BoundaryClassifier;
    harness::require_examples(family, examples, config)?;
    if examples
        .iter()
        .all(|example| example.targets.boundary_class.is_none())
    {
        return Err(TrainingError::NoTargets { family });
    }

    let keys = family.feature_keys(schema);
    let rows = harness::encode(schema, &keys, examples);
    let truth = examples
        .iter()
        .map(targets::boundary_class)
        .collect::<Vec<_>>();
    let split = DataSplit::new(examples.len(), config.validation_fraction, config.seed);

    let class_names = BoundaryClass::names();
    let labels = split
        .train
        .iter()
        .map(|&i| truth[i].index())
        .collect::<Vec<_>>();
    let model = SoftmaxRegression::fit(
        &targets::select(&rows, &split.train),
        &labels,
        class_names.clone(),
        &config.logistic,
    )
    .map_err(fit_error(family))?;

    let predicted = split
        .validation
        .iter()
        .map(|&i| {
            let index = model.predict(&rows[i])?;
            Ok(BoundaryClass::from_index(index).unwrap_or(BoundaryClass::Unknown))
        })
        .collect::<Result<Vec<_>, EstimatorError>>()
        .map_err(fit_error(family))?;
    let validation_truth = targets::select(&truth, &split.validation);
    let metrics = FamilyMetrics::BoundaryClassifier(BoundaryMetrics {
        accuracy: metrics::accuracy(&validation_truth, &predicted),
        false_safe_rate: metrics::false_safe_rate(&validation_truth, &predicted),
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
        .with_artifact(CLASS_NAMES_FILE, &class_names)?;
    TrainedVersion::publish(store, &bundle, record)
}
