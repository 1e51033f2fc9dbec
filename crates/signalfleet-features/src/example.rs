use serde::{Deserialize, Serialize};

use crate::value::{FeatureMap, FeatureValue};

/// One labeled training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub id: String,
    #[serde(default = "unknown")]
    pub source: String,
    #[serde(default = "unknown", alias = "industry_key", alias = "industry")]
    pub category: String,
    #[serde(default)]
    pub features: FeatureMap,
    #[serde(default)]
    pub targets: Targets,
}

fn unknown() -> String {
    "unknown".to_owned()
}

impl TrainingExample {
    /// The example's `window_rule` feature, if it is a category string.
    #[must_use]
    pub fn window_rule(&self) -> Option<&str> {
        match self.features.get("window_rule") {
            Some(FeatureValue::Category(rule)) => Some(rule),
            _ => None,
        }
    }

    /// Mean of the numeric benchmark percentiles, if any were observed.
    #[must_use]
    pub fn mean_benchmark_percentile(&self) -> Option<f64> {
        signalfleet_stats::descriptive::mean(
            self.targets
                .benchmark
                .iter()
                .filter_map(|obs| obs.percentile)
                .filter(|p| p.is_finite()),
        )
    }
}

/// Per-family supervision targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default)]
    pub pressure_keys: Vec<String>,
    #[serde(default)]
    pub boundary_class: Option<String>,
    #[serde(default, alias = "benchmark_metrics")]
    pub benchmark: Vec<BenchmarkObservation>,
}

/// A single benchmark percentile observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkObservation {
    #[serde(default)]
    pub metric_key: Option<String>,
    #[serde(default)]
    pub percentile: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
}
