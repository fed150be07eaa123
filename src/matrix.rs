//! Contact matrix type and the observed-over-expected transform.

use crate::error::{Result, ScoreError};
use ndarray::{s, Array2, ArrayBase, Data, Ix2};

/// Dense contact matrix; entry `(i, j)` is the interaction between bins `i` and `j`.
pub type ContactMatrix = Array2<f64>;

/// Return the side length of a square matrix.
pub fn square_dim<S>(matrix: &ArrayBase<S, Ix2>) -> Result<usize>
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(ScoreError::NotSquare { rows, cols });
    }
    Ok(rows)
}

/// Check whether a matrix is symmetric within `tolerance`.
pub fn is_symmetric<S>(matrix: &ArrayBase<S, Ix2>, tolerance: f64) -> bool
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return false;
    }
    (0..rows).all(|i| (i + 1..cols).all(|j| (matrix[[i, j]] - matrix[[j, i]]).abs() <= tolerance))
}

/// Mean contact frequency at every distance from the main diagonal.
///
/// Element `k` is the mean of the `k`-th upper diagonal.
pub fn expected_by_distance<S>(matrix: &ArrayBase<S, Ix2>) -> Result<Vec<f64>>
where
    S: Data<Elem = f64>,
{
    let n = square_dim(matrix)?;
    Ok((0..n)
        .map(|k| {
            let diag = matrix.slice(s![.., k..]).into_diag();
            diag.sum() / diag.len() as f64
        })
        .collect())
}

/// Divide every entry by the mean of its diagonal.
///
/// Uses the upper triangle and mirrors it, so the result is symmetric by
/// construction. Diagonals whose mean is zero are left at zero.
pub fn observed_over_expected<S>(matrix: &ArrayBase<S, Ix2>) -> Result<ContactMatrix>
where
    S: Data<Elem = f64>,
{
    let n = square_dim(matrix)?;
    let expected = expected_by_distance(matrix)?;
    let mut normalized = Array2::zeros((n, n));

    for (k, &mean) in expected.iter().enumerate() {
        if mean == 0.0 {
            log::debug!("diagonal {} has zero mean; leaving it at zero", k);
            continue;
        }
        for i in 0..n - k {
            let value = matrix[[i, i + k]] / mean;
            normalized[[i, i + k]] = value;
            normalized[[i + k, i]] = value;
        }
    }

    Ok(normalized)
}
