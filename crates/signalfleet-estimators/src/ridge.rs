use linfa::{
    DatasetBase,
    traits::{Fit, Predict},
};
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use signalfleet_stats::descriptive;

use crate::{Estimator, EstimatorError, check_targets, matrix_width};

const TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: u32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RidgeFit {
    /// No column varies; predicts the target mean.
    Mean(f64),
    Fitted(ElasticNet<f64>),
}

/// Linear regression with an L2 penalty on the coefficients.
///
/// Minimizes `‖y − Xw − b‖² + α‖w‖²` with an unpenalized intercept, using
/// [`linfa_elasticnet`] with the L1 share at zero and the penalty divided by
/// the row count to match its `1/2n` loss scaling. Columns that are constant
/// over the training rows get a zero coefficient and are not passed to the
/// solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    width: usize,
    columns: Vec<usize>,
    fit: RidgeFit,
}

impl RidgeRegression {
    #[expect(clippy::cast_precision_loss)]
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], alpha: f64) -> Result<Self, EstimatorError> {
        let width = matrix_width(rows)?;
        check_targets(rows, targets.len())?;

        let columns = (0..width)
            .filter(|&col| {
                rows.iter()
                    .any(|row| row[col].to_bits() != rows[0][col].to_bits())
            })
            .collect::<Vec<_>>();
        let fit = if columns.is_empty() {
            RidgeFit::Mean(descriptive::mean(targets.iter().copied()).unwrap_or(0.0))
        } else {
            let records =
                Array2::from_shape_fn((rows.len(), columns.len()), |(i, j)| rows[i][columns[j]]);
            let model = ElasticNet::params()
                .l1_ratio(0.0)
                .penalty(alpha / rows.len() as f64)
                .tolerance(TOLERANCE)
                .max_iterations(MAX_ITERATIONS)
                .fit(&DatasetBase::new(records, Array1::from(targets.to_vec())))
                .map_err(EstimatorError::fit("ridge regression"))?;
            RidgeFit::Fitted(model)
        };
        Ok(Self {
            width,
            columns,
            fit,
        })
    }

    /// One coefficient per input column.
    #[must_use]
    pub fn coefficients(&self) -> Vec<f64> {
        let mut coefficients = vec![0.0; self.width];
        if let RidgeFit::Fitted(model) = &self.fit {
            for (&col, &w) in self.columns.iter().zip(model.hyperplane()) {
                coefficients[col] = w;
            }
        }
        coefficients
    }

    #[must_use]
    pub fn intercept(&self) -> f64 {
        match &self.fit {
            RidgeFit::Mean(mean) => *mean,
            RidgeFit::Fitted(model) => model.intercept(),
        }
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64, EstimatorError> {
        self.check_width(row)?;
        match &self.fit {
            RidgeFit::Mean(mean) => Ok(*mean),
            RidgeFit::Fitted(model) => {
                let x = Array2::from_shape_fn((1, self.columns.len()), |(_, j)| row[self.columns[j]]);
                let y: Array1<f64> = model.predict(&x);
                Ok(y[0])
            }
        }
    }
}

impl Estimator for RidgeRegression {
    fn input_width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let rows = vec![vec![-1.0], vec![0.0], vec![1.0]];
        let targets = [-2.0, 0.0, 2.0];
        // xᵀx = 2, xᵀy = 4, so w = 4 / (2 + α)
        let model = RidgeRegression::fit(&rows, &targets, 2.0).unwrap();
        assert!((model.coefficients()[0] - 1.0).abs() < 1e-9);
        assert!(model.intercept().abs() < 1e-9);
    }

    #[test]
    fn test_constant_feature_handled() {
        let rows = vec![vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]];
        let model = RidgeRegression::fit(&rows, &[10.0, 20.0, 30.0], 1.0).unwrap();
        assert_eq!(model.coefficients()[0], 0.0);
        // w = 20 / (2 + 1)
        assert!((model.predict(&[5.0, 2.0]).unwrap() - 20.0).abs() < 1e-9);
        assert!((model.coefficients()[1] - 20.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_width_checked() {
        let model = RidgeRegression::fit(&[vec![1.0, 2.0], vec![2.0, 1.0]], &[1.0, 2.0], 1.0).unwrap();
        assert!(model.predict(&[1.0]).is_err());
        assert!(matches!(
            RidgeRegression::fit(&[vec![1.0]], &[1.0, 2.0], 1.0),
            Err(EstimatorError::TargetCountMismatch { .. })
        ));
    }

    #[test]
    fn test_no_varying_column_predicts_mean() {
        let rows = vec![vec![1.0, 4.0]; 3];
        let model = RidgeRegression::fit(&rows, &[10.0, 20.0, 60.0], 1.0).unwrap();
        assert_eq!(model.coefficients(), [0.0, 0.0]);
        assert_eq!(model.predict(&[9.0, 9.0]).unwrap(), 30.0);
    }

    #[test]
    fn test_json_round_trip_predicts_identically() {
        let rows = vec![
            vec![1.0, 0.5, 3.0],
            vec![2.0, 1.5, 3.0],
            vec![3.0, 0.0, 3.0],
            vec![4.0, 2.5, 3.0],
        ];
        let model = RidgeRegression::fit(&rows, &[1.0, 2.5, 2.0, 4.5], 0.5).unwrap();
        let restored: RidgeRegression =
            serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
        for row in &rows {
            assert_eq!(
                model.predict(row).unwrap().to_bits(),
                restored.predict(row).unwrap().to_bits()
            );
        }
        assert_eq!(model.coefficients()[2], 0.0);
    }
}
