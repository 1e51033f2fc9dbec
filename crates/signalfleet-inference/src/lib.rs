//! Predictions from promoted (or explicitly chosen) model versions.
//!
//! A [`Predictor`] loads one version per requested family and can then
//! score any number of inputs. [`infer`] does both in one call.
//!
//! Families whose model cannot be found are reported under
//! [`InferenceResult::unavailable`] instead of failing the call, unless no
//! requested family could be loaded at all. A version trained on another
//! feature layout always fails the call.

use signalfleet_estimators::EstimatorError;
use signalfleet_features::{
    schema::FeatureSchema,
    value::{FeatureMap, InvalidInputError, parse_feature_map},
};
use signalfleet_store::{ModelFamily, ModelStore, StoreError, VersionId, VersionSelector};

pub mod loaded;
pub mod prediction;

pub use self::{
    loaded::LoadedFamily,
    prediction::{InferenceResult, UnavailableFamily},
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum InferenceError {
    #[display("{family} model {version} was trained on a different feature schema")]
    SchemaMismatch {
        family: ModelFamily,
        version: VersionId,
    },
    #[display("invalid input features")]
    InvalidInput { source: InvalidInputError },
    #[display("model store error")]
    Store { source: StoreError },
    #[display("{family} model failed to predict")]
    Estimator {
        family: ModelFamily,
        source: EstimatorError,
    },
}

impl From<StoreError> for InferenceError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

/// Model versions loaded for a set of families.
#[derive(Debug)]
pub struct Predictor {
    loaded: Vec<LoadedFamily>,
    unavailable: Vec<UnavailableFamily>,
}

impl Predictor {
    pub fn load(
        store: &ModelStore,
        schema: &FeatureSchema,
        families: &[ModelFamily],
        selector: &VersionSelector,
    ) -> Result<Self, InferenceError> {
        let mut loaded = Vec::new();
        let mut unavailable = Vec::new();
        let mut first_error = None;
        for &family in families {
            match LoadedFamily::load(store, schema, family, selector) {
                Ok(model) => loaded.push(model),
                Err(InferenceError::Store { source }) => {
                    tracing::warn!(%family, error = %source, "model unavailable");
                    unavailable.push(UnavailableFamily {
                        family,
                        reason: error_chain(&source),
                    });
                    first_error.get_or_insert(source);
                }
                Err(e) => return Err(e),
            }
        }
        if loaded.is_empty()
            && let Some(source) = first_error
        {
            return Err(InferenceError::Store { source });
        }
        Ok(Self {
            loaded,
            unavailable,
        })
    }

    #[must_use]
    pub fn loaded(&self) -> &[LoadedFamily] {
        &self.loaded
    }

    #[must_use]
    pub fn unavailable(&self) -> &[UnavailableFamily] {
        &self.unavailable
    }

    pub fn predict(&self, features: &FeatureMap) -> Result<InferenceResult, InferenceError> {
        let mut result = InferenceResult {
            unavailable: self.unavailable.clone(),
            ..InferenceResult::default()
        };
        for model in &self.loaded {
            model
                .predict_into(features, &mut result)
                .map_err(|source| InferenceError::Estimator {
                    family: model.family(),
                    source,
                })?;
        }
        Ok(result)
    }
}

/// Loads the selected version of each family and scores `features` once.
pub fn infer(
    store: &ModelStore,
    schema: &FeatureSchema,
    families: &[ModelFamily],
    features: &FeatureMap,
    selector: &VersionSelector,
) -> Result<InferenceResult, InferenceError> {
    Predictor::load(store, schema, families, selector)?.predict(features)
}

/// [`infer`] for features given as a JSON object.
pub fn infer_json(
    store: &ModelStore,
    schema: &FeatureSchema,
    families: &[ModelFamily],
    features: &str,
    selector: &VersionSelector,
) -> Result<InferenceResult, InferenceError> {
    let features =
        parse_feature_map(features).map_err(|source| InferenceError::InvalidInput { source })?;
    infer(store, schema, families, &features, selector)
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

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use signalfleet_estimators::ridge::RidgeRegression;
    use signalfleet_features::{example::TrainingExample, value::FeatureValue};
    use signalfleet_store::{
        ModelBundle,
        metadata::{CalibratorMetrics, FamilyMetrics, TrainingRecord},
    };
    use signalfleet_training::{TrainingConfig, train_family};

    use super::*;

    fn schema() -> FeatureSchema {
        let encoders = BTreeMap::from([(
            "industry_key".to_owned(),
            BTreeMap::from([("hvac".to_owned(), 1), ("plumbing".to_owned(), 2)]),
        )]);
        FeatureSchema::new(
            "test_v1",
            ["avg_job_value", "total_jobs", "industry_key"],
            encoders,
        )
        .unwrap()
    }

    fn examples() -> Vec<TrainingExample> {
        (0..20)
            .map(|i| {
                let offset = f64::from(i);
                let (industry, pressure, boundary, percentile, value, jobs) = if i % 2 == 0 {
                    ("hvac", r#"["cash_flow"]"#, "needs_followup", 20.0, 100.0, 10.0)
                } else {
                    ("plumbing", r#"["capacity", "pricing"]"#, "stable", 80.0, 900.0, 60.0)
                };
                let json = format!(
                    r#"{{"id": "ex-{i}", "source": "mock", "industry_key": "{industry}",
                        "features": {{"avg_job_value": {}, "total_jobs": {}, "industry_key": "{industry}"}},
                        "targets": {{"pressure_keys": {pressure}, "boundary_class": "{boundary}",
                                     "benchmark": [{{"percentile": {percentile}}}]}}}}"#,
                    value + offset,
                    jobs + offset * 0.1,
                );
                serde_json::from_str(&json).unwrap()
            })
            .collect()
    }

    fn features(value: f64, jobs: f64, industry: &str) -> FeatureMap {
        FeatureMap::from([
            ("avg_job_value".to_owned(), FeatureValue::Number(value)),
            ("total_jobs".to_owned(), FeatureValue::Number(jobs)),
            ("industry_key".to_owned(), FeatureValue::from(industry)),
        ])
    }

    fn train_and_promote(store: &ModelStore, families: &[ModelFamily]) -> Vec<VersionId> {
        let config = TrainingConfig {
            clusters: 2,
            ..TrainingConfig::default()
        };
        families
            .iter()
            .map(|&family| {
                let trained = train_family(store, &schema(), family, &examples(), &config).unwrap();
                store.promote(family, &trained.version).unwrap();
                trained.version
            })
            .collect()
    }

    #[test]
    fn test_every_family_predicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let versions = train_and_promote(&store, &ModelFamily::ALL);

        let result = infer(
            &store,
            &schema(),
            &ModelFamily::ALL,
            &features(105.0, 10.5, "hvac"),
            &VersionSelector::Latest,
        )
        .unwrap();

        let cohort = result.cohort.unwrap();
        assert_eq!(cohort.cohort_label, format!("cohort_{}", cohort.cohort_id));
        assert!(cohort.confidence > 0.0 && cohort.confidence <= 1.0);
        assert_eq!(cohort.expected_ranges.len(), 2);

        let pressure_keys = result.pressure_keys.unwrap();
        assert_eq!(pressure_keys.len(), 3);
        assert_eq!(pressure_keys[0], "cash_flow");

        let boundary = result.boundary.unwrap();
        assert_eq!(boundary.boundary_class, "needs_followup");
        assert!(boundary.confidence > 0.25);

        assert!(result.calibrated_percentiles.unwrap().avg < 50.0);
        assert_eq!(
            result.model_versions.values().cloned().collect::<Vec<_>>(),
            versions
        );
        assert!(result.unavailable.is_empty());
    }

    #[test]
    fn test_missing_family_is_reported_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        train_and_promote(&store, &[ModelFamily::PressureSelector]);

        let result = infer(
            &store,
            &schema(),
            &[ModelFamily::Cohort, ModelFamily::PressureSelector],
            &features(905.0, 60.5, "plumbing"),
            &VersionSelector::Latest,
        )
        .unwrap();
        assert!(result.cohort.is_none());
        assert!(result.pressure_keys.is_some());
        assert_eq!(result.unavailable.len(), 1);
        assert_eq!(result.unavailable[0].family, ModelFamily::Cohort);
        assert_eq!(result.unavailable[0].reason, "no promoted cohort model");
        assert_eq!(result.model_versions.len(), 1);
    }

    #[test]
    fn test_latest_needs_a_promoted_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let trained = train_family(
            &store,
            &schema(),
            ModelFamily::PressureSelector,
            &examples(),
            &TrainingConfig::default(),
        )
        .unwrap();
        let families = [ModelFamily::PressureSelector, ModelFamily::Calibrator];
        let input = features(100.0, 10.0, "hvac");

        let result = infer(&store, &schema(), &families, &input, &VersionSelector::Latest);
        assert!(matches!(
            result,
            Err(InferenceError::Store {
                source: StoreError::NoPromotedModel {
                    family: ModelFamily::PressureSelector
                }
            })
        ));

        let selector = VersionSelector::Version(trained.version.clone());
        let result = infer(&store, &schema(), &families, &input, &selector).unwrap();
        assert_eq!(
            result.model_versions[&ModelFamily::PressureSelector],
            trained.version
        );
        assert_eq!(result.unavailable[0].family, ModelFamily::Calibrator);
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        train_and_promote(&store, &[ModelFamily::PressureSelector]);

        let other = FeatureSchema::new(
            "test_v2",
            ["avg_job_value", "total_jobs", "industry_key", "has_quotes"],
            schema().encoders().clone(),
        )
        .unwrap();
        let result = infer(
            &store,
            &other,
            &[ModelFamily::Cohort, ModelFamily::PressureSelector],
            &features(100.0, 10.0, "hvac"),
            &VersionSelector::Latest,
        );
        assert!(matches!(
            result,
            Err(InferenceError::SchemaMismatch {
                family: ModelFamily::PressureSelector,
                ..
            })
        ));
    }

    #[test]
    fn test_stored_model_predicts_bit_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let schema = schema();
        let rows = vec![
            vec![0.1, 3.0, 1.0],
            vec![0.7, 1.0, 2.0],
            vec![0.3, 2.5, 1.0],
            vec![0.9, 0.5, 0.0],
        ];
        let model = RidgeRegression::fit(&rows, &[12.5, 71.0, 33.3, 90.1], 0.3).unwrap();
        let record = TrainingRecord {
            schema_version: schema.version().to_owned(),
            schema_hash: schema.hash().to_owned(),
            feature_keys: schema.keys().to_vec(),
            categorical_encoders: schema.encoders().clone(),
            dataset_fingerprint: "fixture".to_owned(),
            training_examples: 4,
            validation_examples: 0,
            metrics: FamilyMetrics::Calibrator(CalibratorMetrics { mae: 0.0 }),
        };
        let bundle = ModelBundle::new(ModelFamily::Calibrator, &model, record).unwrap();
        let version = store.write_version(&bundle).unwrap();

        let input = features(0.3, 2.5, "hvac");
        let result = infer(
            &store,
            &schema,
            &[ModelFamily::Calibrator],
            &input,
            &VersionSelector::Version(version),
        )
        .unwrap();
        let expected = model.predict(&[0.3, 2.5, 1.0]).unwrap();
        assert_eq!(
            result.calibrated_percentiles.unwrap().avg.to_bits(),
            expected.to_bits()
        );
    }

    #[test]
    fn test_predictor_is_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        train_and_promote(&store, &[ModelFamily::Cohort]);

        let predictor = Predictor::load(
            &store,
            &schema(),
            &[ModelFamily::Cohort],
            &VersionSelector::Latest,
        )
        .unwrap();
        let low = predictor.predict(&features(105.0, 10.5, "hvac")).unwrap();
        let high = predictor.predict(&features(905.0, 60.5, "plumbing")).unwrap();
        assert_ne!(
            low.cohort.unwrap().cohort_id,
            high.cohort.unwrap().cohort_id
        );
        // missing keys encode as zero rather than failing
        assert!(predictor.predict(&FeatureMap::new()).unwrap().cohort.is_some());
    }

    #[test]
    fn test_invalid_features_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let result = infer_json(
            &store,
            &schema(),
            &ModelFamily::ALL,
            r#"{"avg_job_value": [1, 2]}"#,
            &VersionSelector::Latest,
        );
        assert!(matches!(result, Err(InferenceError::InvalidInput { .. })));
    }
}
