//! Quality measures for hard cluster assignments.
//!
//! - [`silhouette_score`] measures how well each point sits inside its own
//!   cluster compared to the nearest other cluster.
//! - [`adjusted_rand_index`] measures agreement between two labelings of the
//!   same points, corrected for chance.
//! - [`cluster_sizes`] counts members per cluster id.

use std::collections::{BTreeMap, BTreeSet};

/// Euclidean distance between two points of equal dimension.
#[must_use]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Counts the members of each cluster id in `0..cluster_count`.
///
/// Labels outside that range are ignored.
///
/// ```
/// # use signalfleet_stats::clustering::cluster_sizes;
/// assert_eq!(cluster_sizes(&[0, 2, 2, 0, 2], 4), vec![2, 0, 3, 0]);
/// ```
#[must_use]
pub fn cluster_sizes(labels: &[usize], cluster_count: usize) -> Vec<usize> {
    let mut sizes = vec![0; cluster_count];
    for &label in labels {
        if let Some(size) = sizes.get_mut(label) {
            *size += 1;
        }
    }
    sizes
}

/// Mean silhouette coefficient over all points.
///
/// For each point, `a` is the mean distance to the other members of its
/// cluster and `b` the smallest mean distance to the members of another
/// cluster; the point scores `(b - a) / max(a, b)`. Points in singleton
/// clusters score 0.
///
/// Returns `None` unless the number of distinct labels is between 2 and
/// `n - 1` inclusive.
///
/// ```
/// # use signalfleet_stats::clustering::silhouette_score;
/// let points = vec![vec![0.0], vec![0.1], vec![10.0], vec![10.1]];
/// let score = silhouette_score(&points, &[0, 0, 1, 1]).unwrap();
/// assert!(score > 0.9);
/// assert_eq!(silhouette_score(&points, &[0, 0, 0, 0]), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn silhouette_score(points: &[Vec<f64>], labels: &[usize]) -> Option<f64> {
    assert_eq!(points.len(), labels.len(), "points and labels must align");
    let n = points.len();
    let distinct = labels.iter().collect::<BTreeSet<_>>();
    if distinct.len() < 2 || distinct.len() > n.saturating_sub(1) {
        return None;
    }

    let mut total = 0.0;
    for (i, point) in points.iter().enumerate() {
        // (sum of distances, member count) per cluster, excluding the point itself
        let mut per_cluster: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        for (j, other) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            let entry = per_cluster.entry(labels[j]).or_insert((0.0, 0));
            entry.0 += euclidean_distance(point, other);
            entry.1 += 1;
        }

        let own = labels[i];
        let Some(&(own_sum, own_count)) = per_cluster.get(&own).filter(|(_, c)| *c > 0) else {
            continue;
        };
        let a = own_sum / own_count as f64;
        let b = per_cluster
            .iter()
            .filter(|(label, _)| **label != own)
            .map(|(_, (sum, count))| sum / *count as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    Some(total / n as f64)
}

fn pairs(count: usize) -> f64 {
    #[expect(clippy::cast_precision_loss)]
    let count = count as f64;
    count * (count - 1.0) / 2.0
}

/// Adjusted Rand index between two labelings of the same points.
///
/// Returns 1.0 for identical partitions (up to relabeling), values near 0.0
/// for chance-level agreement. Degenerate inputs where the index cannot be
/// normalized (fewer than two points, or both labelings trivially
/// identical) return 1.0.
///
/// ```
/// # use signalfleet_stats::clustering::adjusted_rand_index;
/// assert_eq!(adjusted_rand_index(&[0, 0, 1, 1], &[5, 5, 3, 3]), 1.0);
/// assert!(adjusted_rand_index(&[0, 0, 1, 1], &[0, 1, 0, 1]) < 0.0);
/// ```
#[must_use]
pub fn adjusted_rand_index(labels_a: &[usize], labels_b: &[usize]) -> f64 {
    assert_eq!(labels_a.len(), labels_b.len(), "labelings must align");
    let n = labels_a.len();
    if n < 2 {
        return 1.0;
    }

    let mut contingency: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut row_sums: BTreeMap<usize, usize> = BTreeMap::new();
    let mut col_sums: BTreeMap<usize, usize> = BTreeMap::new();
    for (&a, &b) in labels_a.iter().zip(labels_b) {
        *contingency.entry((a, b)).or_default() += 1;
        *row_sums.entry(a).or_default() += 1;
        *col_sums.entry(b).or_default() += 1;
    }

    let index = contingency.values().map(|&c| pairs(c)).sum::<f64>();
    let sum_rows = row_sums.values().map(|&c| pairs(c)).sum::<f64>();
    let sum_cols = col_sums.values().map(|&c| pairs(c)).sum::<f64>();
    let expected = sum_rows * sum_cols / pairs(n);
    let max_index = f64::midpoint(sum_rows, sum_cols);

    let denom = max_index - expected;
    if denom.abs() < f64::EPSILON {
        return 1.0;
    }
    (index - expected) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silhouette_singleton_cluster_scores_zero() {
        let points = vec![vec![0.0], vec![1.0], vec![1.2], vec![9.0]];
        let labels = [0, 1, 1, 2];
        let score = silhouette_score(&points, &labels).unwrap();
        // only the two members of cluster 1 contribute
        let a = 0.2_f64;
        let b1 = 1.0_f64;
        let b2 = 1.2_f64;
        let expected = ((b1 - a) / b1 + (b2 - a) / b2) / 4.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_rejects_one_label_per_point() {
        let points = vec![vec![0.0], vec![1.0], vec![2.0]];
        assert_eq!(silhouette_score(&points, &[0, 1, 2]), None);
    }

    #[test]
    fn test_ari_is_symmetric() {
        let a = [0, 0, 0, 1, 1, 2, 2, 2];
        let b = [1, 1, 0, 0, 2, 2, 2, 2];
        let ab = adjusted_rand_index(&a, &b);
        let ba = adjusted_rand_index(&b, &a);
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab < 1.0);
    }

    #[test]
    fn test_ari_single_cluster_both_sides() {
        assert_eq!(adjusted_rand_index(&[3, 3, 3], &[1, 1, 1]), 1.0);
    }
}
