//! Per-version metadata and the metrics recorded at training time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalfleet_features::schema::{CategoricalEncoders, FeatureSchema};

use crate::{family::ModelFamily, version::VersionId};

/// Everything the trainer knows about a freshly fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub schema_version: String,
    pub schema_hash: String,
    /// Feature keys in the order the estimator consumes them.
    pub feature_keys: Vec<String>,
    #[serde(default)]
    pub categorical_encoders: CategoricalEncoders,
    pub dataset_fingerprint: String,
    pub training_examples: usize,
    pub validation_examples: usize,
    pub metrics: FamilyMetrics,
}

impl TrainingRecord {
    /// Whether the recorded key order is the one `family` derives from `schema`.
    #[must_use]
    pub fn matches_schema(&self, family: ModelFamily, schema: &FeatureSchema) -> bool {
        self.feature_keys == family.feature_keys(schema)
    }
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub family: ModelFamily,
    pub version: VersionId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: TrainingRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_quality: Option<CohortQuality>,
    #[serde(default)]
    pub promoted: bool,
}

impl ModelMetadata {
    #[must_use]
    pub fn metrics_file(&self) -> MetricsFile {
        MetricsFile {
            metrics: self.record.metrics.clone(),
            cohort_quality: self.cohort_quality.clone(),
        }
    }
}

/// Contents of `metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsFile {
    pub metrics: FamilyMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_quality: Option<CohortQuality>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FamilyMetrics {
    Cohort(CohortMetrics),
    PressureSelector(PressureMetrics),
    BoundaryClassifier(BoundaryMetrics),
    Calibrator(CalibratorMetrics),
}

impl FamilyMetrics {
    #[must_use]
    pub fn family(&self) -> ModelFamily {
        match self {
            Self::Cohort(_) => ModelFamily::Cohort,
            Self::PressureSelector(_) => ModelFamily::PressureSelector,
            Self::BoundaryClassifier(_) => ModelFamily::BoundaryClassifier,
            Self::Calibrator(_) => ModelFamily::Calibrator,
        }
    }

    #[must_use]
    pub fn as_pressure(&self) -> Option<&PressureMetrics> {
        match self {
            Self::PressureSelector(metrics) => Some(metrics),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMetrics {
    pub clusters: usize,
    pub silhouette: Option<f64>,
    pub stability: Option<f64>,
    pub outlier_rate: f64,
    pub min_cluster_size: usize,
    pub cluster_sizes: Vec<usize>,
    pub inertia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureMetrics {
    pub k: usize,
    pub tag_count: usize,
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub f1_at_k: f64,
    /// Validation examples with at least one true tag.
    pub scored_examples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryMetrics {
    pub accuracy: f64,
    pub false_safe_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratorMetrics {
    pub mae: f64,
}

/// Cohort quality measured after training against an evaluation dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortQuality {
    pub silhouette: Option<f64>,
    pub stability: Option<f64>,
    pub outlier_rate: f64,
    pub min_cluster_size: usize,
    pub evaluated_examples: usize,
    pub evaluated_at: DateTime<Utc>,
}
