//! Logistic regression, one binary [`linfa_logistic`] model per label.
//!
//! Inputs are standardized with a [`StandardScaler`] fitted on the training
//! rows and stored with the model. A label that is present on every training
//! row, or on none, has nothing to separate; it keeps its constant training
//! frequency as its score instead of a fitted model.

use linfa::{DatasetBase, traits::Fit};
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{
    Estimator, EstimatorError, check_targets,
    linalg::{row_matrix, to_matrix},
    scaler::StandardScaler,
};

/// Optimizer settings shared by the logistic models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// L2 penalty on the weights.
    pub alpha: f64,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iterations: 100,
            gradient_tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LabelModel {
    Constant(f64),
    Fitted(FittedLogisticRegression<f64, bool>),
}

impl LabelModel {
    fn probability(&self, scaled: &[f64]) -> f64 {
        match self {
            Self::Constant(p) => *p,
            Self::Fitted(model) => model.predict_probabilities(&row_matrix(scaled))[0],
        }
    }
}

/// One independent binary logistic model per label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneVsRestLogistic {
    scaler: StandardScaler,
    models: Vec<LabelModel>,
}

impl OneVsRestLogistic {
    /// Fits one model per label; `active[i]` lists the label ids present on row `i`.
    pub fn fit(
        rows: &[Vec<f64>],
        active: &[Vec<usize>],
        label_count: usize,
        params: &LogisticParams,
    ) -> Result<Self, EstimatorError> {
        check_targets(rows, active.len())?;
        if let Some(&label) = active.iter().flatten().find(|&&label| label >= label_count) {
            return Err(EstimatorError::LabelOutOfRange {
                label,
                classes: label_count,
            });
        }
        let scaler = StandardScaler::fit(rows)?;
        let scaled = to_matrix(&scaler.transform(rows)?)?;

        let models = (0..label_count)
            .map(|label| {
                let positive = active
                    .iter()
                    .map(|labels| labels.contains(&label))
                    .collect::<Array1<bool>>();
                let hits = positive.iter().filter(|&&p| p).count();
                if hits == 0 || hits == positive.len() {
                    return Ok(LabelModel::Constant(if hits == 0 { 0.0 } else { 1.0 }));
                }
                let model = LogisticRegression::default()
                    .alpha(params.alpha)
                    .max_iterations(params.max_iterations)
                    .gradient_tolerance(params.gradient_tolerance)
                    .fit(&DatasetBase::new(scaled.clone(), positive))
                    .map_err(EstimatorError::fit("logistic regression"))?;
                Ok(LabelModel::Fitted(model))
            })
            .collect::<Result<_, EstimatorError>>()?;
        Ok(Self { scaler, models })
    }

    #[must_use]
    pub fn label_count(&self) -> usize {
        self.models.len()
    }

    /// Probability of each label being active, in label order.
    pub fn predict_scores(&self, row: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        let scaled = self.scaler.transform_row(row)?;
        Ok(self
            .models
            .iter()
            .map(|model| model.probability(&scaled))
            .collect())
    }
}

impl Estimator for OneVsRestLogistic {
    fn input_width(&self) -> usize {
        self.scaler.input_width()
    }
}
