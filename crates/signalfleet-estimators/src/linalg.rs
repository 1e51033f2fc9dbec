use ndarray::{Array2, ArrayView1};

use crate::{EstimatorError, matrix_width};

/// Copies validated training rows into a dense matrix.
pub(crate) fn to_matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>, EstimatorError> {
    let width = matrix_width(rows)?;
    Ok(Array2::from_shape_fn((rows.len(), width), |(i, j)| rows[i][j]))
}

/// A single row as a one-row matrix.
pub(crate) fn row_matrix(row: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((1, row.len()), |(_, j)| row[j])
}

pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the largest value; ties go to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = i;
        }
    }
    best
}

/// Sorted, deduplicated labels.
pub(crate) fn distinct<T>(labels: &[T]) -> Vec<T>
where
    T: Ord + Clone,
{
    let mut distinct = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_matrix() {
        let m = to_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.dim(), (3, 2));
        assert_eq!(m[[2, 0]], 5.0);
        assert_eq!(row_matrix(&[7.0, 8.0]).dim(), (1, 2));
        assert!(matches!(
            to_matrix(&[vec![1.0], vec![1.0, 2.0]]),
            Err(EstimatorError::WidthMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_argmax_and_distinct() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5, 0.1]), 1);
        assert_eq!(distinct(&[3, 1, 3, 0, 1]), [0, 1, 3]);
    }
}
