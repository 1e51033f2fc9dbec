//! Estimators behind the model fleet, built on [`linfa`].
//!
//! Each wrapper takes dense `f64` rows, checks their width, hands an
//! [`ndarray`] matrix to the linfa algorithm and keeps the fitted linfa model.
//! The fitted model serializes to JSON through linfa's serde support, so a
//! stored model reloads with bit-identical predictions.
//!
//! - [`scaler::StandardScaler`]: per-column standardization
//! - [`kmeans::KMeans`]: `linfa-clustering` k-means with k-means++ seeding
//! - [`logistic::OneVsRestLogistic`]: one `linfa-logistic` binary model per label
//! - [`softmax::SoftmaxRegression`]: `linfa-logistic` multinomial regression
//! - [`ridge::RidgeRegression`]: `linfa-elasticnet` with the L1 share set to zero
//!
//! All stochastic steps take an explicit seed. Fitting the same rows with
//! the same parameters always produces the same model.
//!
//! # Example
//!
//! ```
//! use signalfleet_estimators::{Estimator, ridge::RidgeRegression};
//!
//! let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
//! let targets = [1.0, 3.0, 5.0, 7.0];
//! let model = RidgeRegression::fit(&rows, &targets, 1e-9).unwrap();
//! assert_eq!(model.input_width(), 1);
//! assert!((model.predict(&[4.0]).unwrap() - 9.0).abs() < 1e-6);
//! ```

pub mod kmeans;
mod linalg;
pub mod logistic;
pub mod ridge;
pub mod scaler;
pub mod softmax;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EstimatorError {
    #[display("no training rows")]
    EmptyInput,
    #[display("row has {actual} columns, expected {expected}")]
    WidthMismatch { expected: usize, actual: usize },
    #[display("{rows} rows and {targets} targets")]
    TargetCountMismatch { rows: usize, targets: usize },
    #[display("cannot form {clusters} clusters from {samples} samples")]
    TooFewSamples { samples: usize, clusters: usize },
    #[display("label {label} is outside {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },
    #[display("{estimator} fit failed: {message}")]
    Fit {
        estimator: &'static str,
        message: String,
    },
}

impl EstimatorError {
    pub(crate) fn fit<E>(estimator: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::fmt::Display,
    {
        move |e| Self::Fit {
            estimator,
            message: e.to_string(),
        }
    }
}

/// Common surface of every fitted estimator.
pub trait Estimator {
    /// Number of columns each input row must have.
    fn input_width(&self) -> usize;

    fn check_width(&self, row: &[f64]) -> Result<(), EstimatorError> {
        let expected = self.input_width();
        if row.len() == expected {
            Ok(())
        } else {
            Err(EstimatorError::WidthMismatch {
                expected,
                actual: row.len(),
            })
        }
    }
}

/// Validates a training matrix and returns its column count.
pub(crate) fn matrix_width(rows: &[Vec<f64>]) -> Result<usize, EstimatorError> {
    let width = rows.first().ok_or(EstimatorError::EmptyInput)?.len();
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(EstimatorError::WidthMismatch {
            expected: width,
            actual: row.len(),
        });
    }
    Ok(width)
}

pub(crate) fn check_targets(rows: &[Vec<f64>], targets: usize) -> Result<(), EstimatorError> {
    if rows.len() == targets {
        Ok(())
    } else {
        Err(EstimatorError::TargetCountMismatch {
            rows: rows.len(),
            targets,
        })
    }
}
