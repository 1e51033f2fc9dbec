//! Training harness for the model fleet.
//!
//! Every family follows the same shape:
//!
//! ```text
//! examples ──▶ minimum size check ──▶ batch encode ──▶ family targets
//!          ──▶ seeded train/validation split ──▶ fit ──▶ validation metrics
//!          ──▶ new immutable version in the model store
//! ```
//!
//! The cohort family is the exception to the split: clustering is
//! unsupervised, so it is fitted on every example and assessed in place.
//!
//! - [`cohort`]: k-means cohorts with expected metric ranges
//! - [`pressure`]: one-vs-rest pressure tag selector
//! - [`boundary`]: softmax boundary classifier
//! - [`calibrator`]: ridge percentile calibrator
//! - [`harness`]: single-family and whole-fleet entry points
//!
//! Training never moves a LATEST pointer; promotion is a separate decision.

use signalfleet_estimators::EstimatorError;
use signalfleet_store::{ModelFamily, StoreError};

pub mod boundary;
pub mod calibrator;
pub mod cohort;
pub mod config;
pub mod harness;
pub mod pressure;

pub use self::{
    config::TrainingConfig,
    harness::{TrainedVersion, TrainingSummary, train_all, train_family},
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TrainingError {
    #[display("{family} needs at least {required} examples, found {found}")]
    InsufficientData {
        family: ModelFamily,
        required: usize,
        found: usize,
    },
    #[display("no {family} targets in the dataset")]
    NoTargets { family: ModelFamily },
    #[display("failed to fit the {family} model")]
    Estimator {
        family: ModelFamily,
        source: EstimatorError,
    },
    #[display("model store error")]
    Store { source: StoreError },
}

impl TrainingError {
    /// Whether the failure is about the dataset rather than the system, so
    /// that a multi-family run may carry on without this family.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. } | Self::NoTargets { .. })
    }
}

impl From<StoreError> for TrainingError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

/// Wraps an estimator failure; too few distinct samples to fit counts as
/// insufficient data.
pub(crate) fn fit_error(family: ModelFamily) -> impl FnOnce(EstimatorError) -> TrainingError {
    move |source| match source {
        EstimatorError::TooFewSamples { samples, clusters } => TrainingError::InsufficientData {
            family,
            required: clusters,
            found: samples,
        },
        source => TrainingError::Estimator { family, source },
    }
}
