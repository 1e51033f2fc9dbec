use serde::{Deserialize, Serialize};
use signalfleet_estimators::{kmeans::KMeansParams, logistic::LogisticParams};
use signalfleet_evaluator::cohort::AssessmentParams;

/// Metrics for which cohorts carry expected ranges.
pub const BENCHMARK_METRICS: [&str; 12] = [
    "avg_job_value",
    "total_revenue",
    "total_jobs",
    "avg_days_to_invoice",
    "avg_payment_lag_days",
    "pct_jobs_paid_on_time",
    "pct_quoted_won",
    "avg_quote_to_win_days",
    "avg_job_duration_days",
    "pct_jobs_with_followup",
    "avg_items_per_job",
    "revenue_concentration_top3",
];

/// Settings of a training run.
///
/// Every field has a default, so a JSON config only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Families refuse to train on fewer examples than this.
    pub min_examples: usize,
    pub validation_fraction: f64,
    /// Seed of the train/validation shuffle and of k-means.
    pub seed: u64,
    pub clusters: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    /// Cohort stability is only measured with at least this many examples.
    pub min_stability_examples: usize,
    pub benchmark_metrics: Vec<String>,
    /// `k` of the pressure ranking metrics.
    pub top_k: usize,
    pub ridge_alpha: f64,
    pub logistic: LogisticParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_examples: 10,
            validation_fraction: 0.2,
            seed: 42,
            clusters: 8,
            restarts: 10,
            max_iterations: 300,
            min_stability_examples: 100,
            benchmark_metrics: BENCHMARK_METRICS.iter().map(|&m| m.to_owned()).collect(),
            top_k: 3,
            ridge_alpha: 1.0,
            logistic: LogisticParams::default(),
        }
    }
}

impl TrainingConfig {
    #[must_use]
    pub fn kmeans_params(&self) -> KMeansParams {
        KMeansParams {
            clusters: self.clusters,
            restarts: self.restarts,
            max_iterations: self.max_iterations,
            seed: self.seed,
        }
    }

    #[must_use]
    pub fn assessment_params(&self) -> AssessmentParams {
        AssessmentParams {
            clusters: self.clusters,
            seed: self.seed,
            max_iterations: self.max_iterations,
            min_stability_examples: self.min_stability_examples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: TrainingConfig = serde_json::from_str(r#"{"clusters": 4, "seed": 7}"#).unwrap();
        assert_eq!(config.clusters, 4);
        assert_eq!(config.kmeans_params().seed, 7);
        assert_eq!(config.min_examples, 10);
        assert_eq!(config.benchmark_metrics.len(), 12);
    }
}
