//! Ridge-regularised least squares.
//!
//! Solves
//!
//! ```text
//! minimize ‖y - Xβ‖² + Σ_j λ_j β_j²
//! ```
//!
//! by appending `sqrt(λ_j)` rows to the design matrix and solving the
//! resulting ordinary least squares problem with SVD (tall systems are fine).

use nalgebra::{DMatrix, DVector};

/// Solve with per-column ridge penalties (`penalties.len() == x.ncols()`, zero = unpenalised).
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    let (n, p) = x.shape();
    if penalties.len() != p || y.len() != n {
        return None;
    }

    let penalised: Vec<(usize, f64)> = penalties
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, l)| l > 0.0)
        .collect();
    let rows = n + penalised.len();

    let mut xa = DMatrix::<f64>::zeros(rows, p);
    xa.rows_mut(0, n).copy_from(x);
    let mut ya = DVector::<f64>::zeros(rows);
    ya.rows_mut(0, n).copy_from(y);
    for (r, &(col, lambda)) in penalised.iter().enumerate() {
        xa[(n + r, col)] = lambda.sqrt();
    }

    let svd = xa.svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(&ya, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}
