//! k-means clustering on top of [`linfa_clustering::KMeans`].
//!
//! linfa seeds each run with k-means++, iterates Lloyd steps until the
//! centroids move less than a tolerance, and keeps the run with the lowest
//! inertia. The generator is a [`Xoshiro256Plus`] seeded from
//! [`KMeansParams::seed`], so a fitted model is a deterministic function of
//! the rows and the parameters.
//!
//! Fitting needs at least as many distinct rows as clusters; anything less is
//! reported as [`EstimatorError::TooFewSamples`].

use linfa::{
    DatasetBase,
    traits::{Fit, Predict},
};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand_xoshiro::{Xoshiro256Plus, rand_core::SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    Estimator, EstimatorError,
    linalg::{distinct, row_matrix, squared_distance, to_matrix},
};

const TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansParams {
    pub clusters: usize,
    pub restarts: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            clusters: 8,
            restarts: 10,
            max_iterations: 300,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    model: linfa_clustering::KMeans<f64, L2Dist>,
    inertia: f64,
}

impl PartialEq for KMeans {
    fn eq(&self, other: &Self) -> bool {
        self.centroids() == other.centroids() && self.inertia == other.inertia
    }
}

impl KMeans {
    pub fn fit(rows: &[Vec<f64>], params: &KMeansParams) -> Result<Self, EstimatorError> {
        let records = to_matrix(rows)?;
        let distinct_rows = distinct(
            &rows
                .iter()
                .map(|row| row.iter().map(|x| x.to_bits()).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
        )
        .len();
        if params.clusters == 0 || distinct_rows < params.clusters {
            return Err(EstimatorError::TooFewSamples {
                samples: if rows.len() < params.clusters {
                    rows.len()
                } else {
                    distinct_rows
                },
                clusters: params.clusters,
            });
        }

        let rng = Xoshiro256Plus::seed_from_u64(params.seed);
        let model =
            linfa_clustering::KMeans::<f64, L2Dist>::params_with(params.clusters, rng, L2Dist)
                .n_runs(params.restarts.max(1))
                .max_n_iterations(u64::try_from(params.max_iterations.max(1)).unwrap_or(u64::MAX))
                .tolerance(TOLERANCE)
                .fit(&DatasetBase::from(records))
                .map_err(EstimatorError::fit("k-means"))?;

        let inertia = rows
            .iter()
            .map(|row| nearest(model.centroids(), row).1)
            .sum();
        Ok(Self { model, inertia })
    }

    #[must_use]
    pub fn centroids(&self) -> &Array2<f64> {
        self.model.centroids()
    }

    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.centroids().nrows()
    }

    /// Sum of squared distances from the training rows to their nearest centroid.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Nearest centroid id.
    pub fn predict(&self, row: &[f64]) -> Result<usize, EstimatorError> {
        self.check_width(row)?;
        let labels: Array1<usize> = self.model.predict(&row_matrix(row));
        Ok(labels[0])
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>, EstimatorError> {
        let Some(first) = rows.first() else {
            return Ok(vec![]);
        };
        self.check_width(first)?;
        let labels: Array1<usize> = self.model.predict(&to_matrix(rows)?);
        Ok(labels.to_vec())
    }

    /// Euclidean distance from `row` to every centroid.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        self.check_width(row)?;
        Ok(self
            .centroids()
            .rows()
            .into_iter()
            .map(|centroid| squared_distance(centroid, row).sqrt())
            .collect())
    }
}

impl Estimator for KMeans {
    fn input_width(&self) -> usize {
        self.centroids().ncols()
    }
}

fn nearest(centroids: &Array2<f64>, row: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(centroid, row);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}
