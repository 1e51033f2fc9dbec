//! Model families and their stored artifact types.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use signalfleet_estimators::{kmeans::KMeans, scaler::StandardScaler};
use signalfleet_features::schema::FeatureSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Cohort,
    PressureSelector,
    BoundaryClassifier,
    Calibrator,
}

impl ModelFamily {
    pub const ALL: [Self; 4] = [
        Self::Cohort,
        Self::PressureSelector,
        Self::BoundaryClassifier,
        Self::Calibrator,
    ];

    /// Directory name under the models root.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cohort => "cohort",
            Self::PressureSelector => "pressure_selector",
            Self::BoundaryClassifier => "boundary_classifier",
            Self::Calibrator => "calibrator",
        }
    }

    /// File name of the family's side artifact, if it has one.
    #[must_use]
    pub fn side_artifact(self) -> Option<&'static str> {
        match self {
            Self::Cohort => Some(RANGES_FILE),
            Self::PressureSelector => Some(PRESSURE_KEYS_FILE),
            Self::BoundaryClassifier => Some(CLASS_NAMES_FILE),
            Self::Calibrator => None,
        }
    }

    /// Feature keys this family consumes from `schema`, in vector order.
    ///
    /// The cohort family clusters numeric signals only; every other family
    /// uses the whole schema.
    #[must_use]
    pub fn feature_keys(self, schema: &FeatureSchema) -> Vec<String> {
        match self {
            Self::Cohort => schema.numeric_keys(),
            _ => schema.keys().to_vec(),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("unknown model family '{name}'")]
pub struct UnknownFamilyError {
    name: String,
}

impl FromStr for ModelFamily {
    type Err = UnknownFamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| UnknownFamilyError { name: s.to_owned() })
    }
}

pub const RANGES_FILE: &str = "ranges.json";
pub const PRESSURE_KEYS_FILE: &str = "pressure_keys.json";
pub const CLASS_NAMES_FILE: &str = "class_names.json";

/// Stored estimator of the cohort family: clustering happens in scaled space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortModel {
    pub scaler: StandardScaler,
    pub kmeans: KMeans,
}

/// Expected spread of one benchmark metric within a cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub metric_key: String,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
}

/// Cohort id → expected metric ranges.
pub type CohortRanges = BTreeMap<usize, Vec<MetricRange>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for family in ModelFamily::ALL {
            assert_eq!(family.as_str().parse::<ModelFamily>().unwrap(), family);
            assert_eq!(
                serde_json::to_string(&family).unwrap(),
                format!("\"{family}\"")
            );
        }
        assert!("clusters".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_ranges_keys_serialize_as_strings() {
        let mut ranges = CohortRanges::new();
        ranges.insert(
            3,
            vec![MetricRange {
                metric_key: "avg_job_value".to_owned(),
                min: 1.0,
                max: 9.0,
                median: 5.0,
                p25: 3.0,
                p75: 7.0,
            }],
        );
        let json = serde_json::to_string(&ranges).unwrap();
        assert!(json.starts_with(r#"{"3":"#));
        let restored: CohortRanges = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ranges);
    }
}
