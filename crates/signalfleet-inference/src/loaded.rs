//! A single model version read back from the store.

use signalfleet_estimators::{
    EstimatorError, logistic::OneVsRestLogistic, ridge::RidgeRegression,
    softmax::SoftmaxRegression,
};
use signalfleet_evaluator::{metrics::top_k_indices, targets::BoundaryClass};
use signalfleet_features::{codec, schema::FeatureSchema, value::FeatureMap};
use signalfleet_store::{
    ModelFamily, ModelStore, VersionId, VersionSelector,
    family::{CLASS_NAMES_FILE, CohortModel, CohortRanges, PRESSURE_KEYS_FILE, RANGES_FILE},
    metadata::TrainingRecord,
};

use crate::{
    InferenceError,
    prediction::{BoundaryPrediction, CalibratedPercentiles, CohortAssignment, InferenceResult},
};

/// Number of pressure keys suggested per input.
pub const TOP_PRESSURE_KEYS: usize = 3;

#[derive(Debug)]
enum FamilyModel {
    Cohort {
        model: CohortModel,
        ranges: CohortRanges,
    },
    PressureSelector {
        model: OneVsRestLogistic,
        tags: Vec<String>,
    },
    BoundaryClassifier {
        model: SoftmaxRegression,
        class_names: Vec<String>,
    },
    Calibrator {
        model: RidgeRegression,
    },
}

#[derive(Debug)]
pub struct LoadedFamily {
    family: ModelFamily,
    version: VersionId,
    record: TrainingRecord,
    model: FamilyModel,
}

impl LoadedFamily {
    /// Resolves `selector` and loads the version with its side artifact.
    ///
    /// Fails with [`InferenceError::SchemaMismatch`] when the version was
    /// trained on a different key order than `schema` gives the family.
    pub fn load(
        store: &ModelStore,
        schema: &FeatureSchema,
        family: ModelFamily,
        selector: &VersionSelector,
    ) -> Result<Self, InferenceError> {
        let version = store.resolve(family, selector)?;
        let metadata = store.read_metadata(family, &version)?;
        if !metadata.record.matches_schema(family, schema) {
            return Err(InferenceError::SchemaMismatch { family, version });
        }

        let model = match family {
            ModelFamily::Cohort => FamilyModel::Cohort {
                model: store.load_estimator(family, &version)?,
                ranges: store.read_side_artifact(family, &version, RANGES_FILE)?,
            },
            ModelFamily::PressureSelector => FamilyModel::PressureSelector {
                model: store.load_estimator(family, &version)?,
                tags: store.read_side_artifact(family, &version, PRESSURE_KEYS_FILE)?,
            },
            ModelFamily::BoundaryClassifier => FamilyModel::BoundaryClassifier {
                model: store.load_estimator(family, &version)?,
                class_names: store.read_side_artifact(family, &version, CLASS_NAMES_FILE)?,
            },
            ModelFamily::Calibrator => FamilyModel::Calibrator {
                model: store.load_estimator(family, &version)?,
            },
        };
        tracing::debug!(%family, %version, "loaded model");
        Ok(Self {
            family,
            version,
            record: metadata.record,
            model,
        })
    }

    #[must_use]
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    #[must_use]
    pub fn version(&self) -> &VersionId {
        &self.version
    }

    /// Encodes `features` in the recorded key order. Absent and unusable
    /// values become `0.0`.
    #[must_use]
    pub fn encode(&self, features: &FeatureMap) -> Vec<f64> {
        codec::encode_with_keys(
            &self.record.feature_keys,
            &self.record.categorical_encoders,
            features,
        )
    }

    /// Writes this family's prediction for `features` into `result`.
    pub fn predict_into(
        &self,
        features: &FeatureMap,
        result: &mut InferenceResult,
    ) -> Result<(), EstimatorError> {
        let row = self.encode(features);
        match &self.model {
            FamilyModel::Cohort { model, ranges } => {
                let scaled = model.scaler.transform_row(&row)?;
                let cohort_id = model.kmeans.predict(&scaled)?;
                let distance = model.kmeans.transform(&scaled)?[cohort_id];
                let expected_ranges = ranges.get(&cohort_id).cloned().unwrap_or_default();
                result.cohort = Some(CohortAssignment::new(cohort_id, distance, expected_ranges));
            }
            FamilyModel::PressureSelector { model, tags } => {
                let scores = model.predict_scores(&row)?;
                let keys = top_k_indices(&scores, TOP_PRESSURE_KEYS)
                    .into_iter()
                    .filter_map(|i| tags.get(i).cloned())
                    .collect();
                result.pressure_keys = Some(keys);
            }
            FamilyModel::BoundaryClassifier { model, class_names } => {
                let proba = model.predict_proba(&row)?;
                let class = model.predict(&row)?;
                let boundary_class = class_names
                    .get(class)
                    .map_or(BoundaryClass::Unknown.as_str(), String::as_str)
                    .to_owned();
                result.boundary = Some(BoundaryPrediction {
                    boundary_class,
                    confidence: proba[class],
                });
            }
            FamilyModel::Calibrator { model } => {
                result.calibrated_percentiles = Some(CalibratedPercentiles {
                    avg: model.predict(&row)?,
                });
            }
        }
        result
            .model_versions
            .insert(self.family, self.version.clone());
        Ok(())
    }
}
