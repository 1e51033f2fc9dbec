//! Task metrics shared by training and evaluation.
//!
//! # Ranking (pressure selector)
//!
//! For each example the `k` highest-scoring tags are predicted (score
//! descending, ties to the lower tag index). With `hits` the number of
//! predicted tags that are true:
//!
//! - precision@k = `hits / k`
//! - recall@k = `hits / |true tags|`
//!
//! Both are averaged over examples that have at least one true tag; examples
//! with no true tag are not scored. With nothing scored both are 0.0.
//!
//! # Safety (boundary classifier)
//!
//! The false-safe rate is the share of examples whose true class is unsafe
//! (anything but `stable` and `unknown`) that were predicted `stable`.
//!
//! # Regression (calibrator)
//!
//! Mean absolute error, and the standard deviation of residuals as a
//! stability measure.

use serde::{Deserialize, Serialize};
use signalfleet_stats::descriptive::{self, DescriptiveStats};

use crate::targets::BoundaryClass;

/// Indices of the `k` largest scores, best first; ties go to the lower index.
///
/// ```
/// # use signalfleet_evaluator::metrics::top_k_indices;
/// assert_eq!(top_k_indices(&[0.2, 0.9, 0.2, 0.5], 3), vec![1, 3, 0]);
/// ```
#[must_use]
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indices = (0..scores.len()).collect::<Vec<_>>();
    // stable sort keeps the lower index first among equal scores
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    indices.truncate(k);
    indices
}

/// Averaged precision@k / recall@k over the scored examples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingScore {
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub scored_examples: usize,
}

impl RankingScore {
    #[must_use]
    pub fn f1(&self) -> f64 {
        f1_score(self.precision_at_k, self.recall_at_k)
    }
}

/// Precision@k and recall@k; `truth[i]` lists the true tag indices of example `i`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn precision_recall_at_k(truth: &[Vec<usize>], scores: &[Vec<f64>], k: usize) -> RankingScore {
    let mut precisions = vec![];
    let mut recalls = vec![];
    for (true_tags, row) in truth.iter().zip(scores) {
        if true_tags.is_empty() {
            continue;
        }
        let predicted = top_k_indices(row, k);
        let hits = predicted.iter().filter(|i| true_tags.contains(i)).count();
        precisions.push(hits as f64 / k as f64);
        recalls.push(hits as f64 / true_tags.len() as f64);
    }
    RankingScore {
        precision_at_k: descriptive::mean(precisions.iter().copied()).unwrap_or(0.0),
        recall_at_k: descriptive::mean(recalls.iter().copied()).unwrap_or(0.0),
        scored_examples: precisions.len(),
    }
}

/// Harmonic mean of precision and recall, 0.0 when both are 0.
#[must_use]
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Share of positions where `truth` and `predicted` agree, 0.0 when empty.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn accuracy<T>(truth: &[T], predicted: &[T]) -> f64
where
    T: PartialEq,
{
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Share of unsafe true classes predicted [`BoundaryClass::Stable`].
///
/// ```
/// # use signalfleet_evaluator::{metrics::false_safe_rate, targets::BoundaryClass::*};
/// assert_eq!(false_safe_rate(&[NeedsFollowup, NeedsFollowup], &[Stable, Stable]), 1.0);
/// assert_eq!(false_safe_rate(&[Stable, Unknown], &[Stable, Stable]), 0.0);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn false_safe_rate(truth: &[BoundaryClass], predicted: &[BoundaryClass]) -> f64 {
    let (unsafe_total, false_safe) = truth
        .iter()
        .zip(predicted)
        .filter(|(t, _)| t.is_unsafe())
        .fold((0_usize, 0_usize), |(total, false_safe), (_, p)| {
            (total + 1, false_safe + usize::from(*p == BoundaryClass::Stable))
        });
    if unsafe_total == 0 {
        0.0
    } else {
        false_safe as f64 / unsafe_total as f64
    }
}

/// Row = true class, column = predicted class, in [`BoundaryClass::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub classes: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn new(truth: &[BoundaryClass], predicted: &[BoundaryClass]) -> Self {
        let n = BoundaryClass::ALL.len();
        let mut counts = vec![vec![0; n]; n];
        for (t, p) in truth.iter().zip(predicted) {
            counts[t.index()][p.index()] += 1;
        }
        Self {
            classes: BoundaryClass::ALL
                .iter()
                .map(|class| class.as_str().to_owned())
                .collect(),
            counts,
        }
    }
}

/// Mean absolute error, `None` when empty.
#[must_use]
pub fn mean_absolute_error(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    descriptive::mean(truth.iter().zip(predicted).map(|(t, p)| (t - p).abs()))
}

/// Population standard deviation of `predicted - truth`, `None` when empty.
#[must_use]
pub fn residual_std(truth: &[f64], predicted: &[f64]) -> Option<f64> {
    DescriptiveStats::new(truth.iter().zip(predicted).map(|(t, p)| p - t)).map(|s| s.std_dev)
}
