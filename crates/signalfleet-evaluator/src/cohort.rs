//! Cohort clustering quality.

use rand::{SeedableRng, seq::SliceRandom};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use signalfleet_estimators::{
    EstimatorError,
    kmeans::{KMeans, KMeansParams},
};
use signalfleet_stats::clustering::{adjusted_rand_index, cluster_sizes, silhouette_score};

/// Restarts used when refitting the halves for the stability check.
const STABILITY_RESTARTS: usize = 5;

/// Quality of a cohort assignment over a set of examples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortAssessment {
    pub silhouette: Option<f64>,
    pub stability: Option<f64>,
    pub outlier_rate: f64,
    pub min_cluster_size: usize,
    pub cluster_sizes: Vec<usize>,
}

/// Settings for [`assess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentParams {
    pub clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
    /// Stability is only measured with at least this many examples.
    pub min_stability_examples: usize,
}

/// Assesses labels assigned to points in scaled space.
pub fn assess(
    scaled: &[Vec<f64>],
    labels: &[usize],
    params: &AssessmentParams,
) -> Result<CohortAssessment, EstimatorError> {
    let sizes = cluster_sizes(labels, params.clusters);
    let stability = if scaled.len() >= params.min_stability_examples {
        stability(scaled, labels, params)?
    } else {
        None
    };
    Ok(CohortAssessment {
        silhouette: silhouette_score(scaled, labels),
        stability,
        outlier_rate: outlier_rate(&sizes, labels.len()),
        min_cluster_size: sizes.iter().copied().min().unwrap_or(0),
        cluster_sizes: sizes,
    })
}

/// Share of clusters smaller than `max(50, 0.02 · n)`.
///
/// ```
/// # use signalfleet_evaluator::cohort::outlier_rate;
/// assert_eq!(outlier_rate(&[60, 10, 80, 0], 150), 0.5);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn outlier_rate(sizes: &[usize], n: usize) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let threshold = f64::max(50.0, 0.02 * n as f64);
    let small = sizes.iter().filter(|&&size| (size as f64) < threshold).count();
    small as f64 / sizes.len() as f64
}

/// Mean adjusted Rand index between the given labels and fresh clusterings
/// of two random halves, or `None` if a half has too few distinct rows to
/// cluster.
pub fn stability(
    scaled: &[Vec<f64>],
    labels: &[usize],
    params: &AssessmentParams,
) -> Result<Option<f64>, EstimatorError> {
    let mut indices = (0..scaled.len()).collect::<Vec<_>>();
    indices.shuffle(&mut Pcg64::seed_from_u64(params.seed));
    let second = indices.split_off(indices.len() / 2);
    let halves = [indices, second];
    if halves.iter().any(|half| half.len() < params.clusters.max(1)) {
        return Ok(None);
    }

    let mut total = 0.0;
    for (offset, half) in (0_u64..).zip(&halves) {
        let rows = half.iter().map(|&i| scaled[i].clone()).collect::<Vec<_>>();
        let original = half.iter().map(|&i| labels[i]).collect::<Vec<_>>();
        let refit = match KMeans::fit(
            &rows,
            &KMeansParams {
                clusters: params.clusters,
                restarts: STABILITY_RESTARTS,
                max_iterations: params.max_iterations,
                seed: params.seed.wrapping_add(offset),
            },
        ) {
            Ok(refit) => refit,
            Err(EstimatorError::TooFewSamples { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        total += adjusted_rand_index(&original, &refit.predict_batch(&rows)?);
    }
    Ok(Some(total / 2.0))
}
