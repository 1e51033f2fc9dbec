use linfa::{DatasetBase, traits::Fit};
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{
    Estimator, EstimatorError, check_targets,
    linalg::{argmax, distinct, row_matrix, to_matrix},
    logistic::LogisticParams,
    scaler::StandardScaler,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClassModel {
    /// Every training row had this class.
    Single(usize),
    /// `seen` lists the trained classes in the model's column order.
    Fitted {
        model: MultiFittedLogisticRegression<f64, usize>,
        seen: Vec<usize>,
    },
}

/// Multinomial logistic regression over a fixed, named class list.
///
/// Classes that never occur in the training rows are kept in the class list
/// with a probability of zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    classes: Vec<String>,
    scaler: StandardScaler,
    model: ClassModel,
}

impl SoftmaxRegression {
    /// Fits the model; `labels[i]` is the class index of row `i`.
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[usize],
        classes: Vec<String>,
        params: &LogisticParams,
    ) -> Result<Self, EstimatorError> {
        check_targets(rows, labels.len())?;
        if let Some(&label) = labels.iter().find(|&&label| label >= classes.len()) {
            return Err(EstimatorError::LabelOutOfRange {
                label,
                classes: classes.len(),
            });
        }
        let scaler = StandardScaler::fit(rows)?;
        let scaled = to_matrix(&scaler.transform(rows)?)?;

        let seen = distinct(labels);
        let model = match seen.as_slice() {
            [only] => ClassModel::Single(*only),
            _ => {
                let model = MultiLogisticRegression::default()
                    .alpha(params.alpha)
                    .max_iterations(params.max_iterations)
                    .gradient_tolerance(params.gradient_tolerance)
                    .fit(&DatasetBase::new(scaled, Array1::from(labels.to_vec())))
                    .map_err(EstimatorError::fit("multinomial logistic regression"))?;
                ClassModel::Fitted { model, seen }
            }
        };
        Ok(Self {
            classes,
            scaler,
            model,
        })
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Probability of every class, in class order.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, EstimatorError> {
        let scaled = self.scaler.transform_row(row)?;
        let mut proba = vec![0.0; self.classes.len()];
        match &self.model {
            ClassModel::Single(class) => proba[*class] = 1.0,
            ClassModel::Fitted { model, seen } => {
                let fitted = model.predict_probabilities(&row_matrix(&scaled));
                for (&class, &p) in seen.iter().zip(fitted.row(0)) {
                    proba[class] = p;
                }
            }
        }
        Ok(proba)
    }

    /// Most probable class index; ties go to the earlier class.
    pub fn predict(&self, row: &[f64]) -> Result<usize, EstimatorError> {
        Ok(argmax(&self.predict_proba(row)?))
    }
}

impl Estimator for SoftmaxRegression {
    fn input_width(&self) -> usize {
        self.scaler.input_width()
    }
}
