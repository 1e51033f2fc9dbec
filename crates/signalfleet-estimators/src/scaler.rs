use serde::{Deserialize, Serialize};
use signalfleet_stats::descriptive;

use crate::{Estimator, EstimatorError, matrix_width};

/// Centers each column on its mean and divides by its population standard
/// deviation. Constant columns keep a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, EstimatorError> {
        let width = matrix_width(rows)?;
        let (mean, scale) = (0..width)
            .map(|col| {
                let column = || rows.iter().map(|row| row[col]);
                let mean = descriptive::mean(column()).unwrap_or(0.0);
                let variance =
                    descriptive::mean(column().map(|x| (x - mean).powi(2))).unwrap_or(0.0);
                let std_dev = variance.sqrt();
                (mean, if std_dev > 0.0 { std_dev } else { 1.0 })
            })
            .unzip();
        Ok(Self { mean, scale })
    }

    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    #[must_use]
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        self.check_width(row)?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, EstimatorError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

impl Estimator for StandardScaler {
    fn input_width(&self) -> usize {
        self.mean.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.mean(), &[2.0, 5.0]);
        assert_eq!(scaler.scale(), &[1.0, 1.0]);
        assert_eq!(scaler.transform_row(&[3.0, 7.0]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_width_checked() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform_row(&[1.0]),
            Err(EstimatorError::WidthMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            StandardScaler::fit(&[]),
            Err(EstimatorError::EmptyInput)
        ));
    }
}
